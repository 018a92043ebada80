#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("controller has shut down")]
    Disconnected,
    #[error("no frame after {polls} startup polls")]
    StartupTimedOut { polls: u32 },
}
