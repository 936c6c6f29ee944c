pub mod admin;
pub mod deletions;
pub mod generic_files;
pub mod health;
pub mod intellectual_objects;
pub mod work_items;
