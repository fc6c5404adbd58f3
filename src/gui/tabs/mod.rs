mod activity_tab;
mod connect_tab;
mod files_tab;

pub use activity_tab::ActivityTab;
pub use connect_tab::ConnectTab;
pub use files_tab::FilesTab;
