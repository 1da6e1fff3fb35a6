pub use super::stored_files::Entity as StoredFiles;
pub use super::users::Entity as Users;
