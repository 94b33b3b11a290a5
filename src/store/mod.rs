pub mod codec;
pub mod completion;
pub mod files;
pub mod history;
pub mod lock;
pub mod tasks;
