pub mod directory_selection;
pub mod messages;

pub use directory_selection::DirectorySelection;
pub use messages::Messages;
