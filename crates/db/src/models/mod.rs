pub mod attendance;
pub mod host_account;
pub mod participant;
pub mod room;
pub mod user;

pub use attendance::Attendance;
pub use host_account::HostAccount;
pub use participant::{Participant, ParticipantRole, ParticipantStatus};
pub use room::{Room, RoomStatus};
pub use user::{GlobalRole, User};
