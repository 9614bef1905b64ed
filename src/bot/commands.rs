use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "Show the welcome message")]
    Start,
    #[command(description = "Show this help")]
    Help,
    #[command(description = "Report a sighting, one question at a time")]
    Report,
    #[command(description = "List sightings from the past week")]
    Recent,
}
