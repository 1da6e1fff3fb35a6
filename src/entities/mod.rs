pub mod prelude;

pub mod stored_files;
pub mod users;
