pub mod grant;
pub mod identity;
pub mod init;
pub mod ls;
pub mod register;
pub mod retrieve;
pub mod share;
pub mod submit;

pub use grant::Grant;
pub use identity::Identity;
pub use init::Init;
pub use ls::Ls;
pub use register::Register;
pub use retrieve::Retrieve;
pub use share::Share;
pub use submit::Submit;
