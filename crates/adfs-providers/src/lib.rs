pub mod adfs_login;
pub mod aws_files;
pub mod keyring_store;
pub mod process;
pub mod shell;

pub use adfs_login::AdfsCliAuthenticator;
pub use aws_files::AwsCredentialsFile;
pub use keyring_store::KeyringLoginStore;
pub use shell::ShellCommandRunner;
