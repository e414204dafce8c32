pub mod appointment;
pub mod appointment_comment;
pub mod appointment_file;
pub mod client;
pub mod client_comment;
pub mod client_file;
pub mod user;

pub use appointment::Entity as Appointment;
pub use appointment_comment::Entity as AppointmentComment;
pub use appointment_file::Entity as AppointmentFile;
pub use client::Entity as Client;
pub use client_comment::Entity as ClientComment;
pub use client_file::Entity as ClientFile;
pub use user::Entity as User;
