mod files;
mod password_resets;
mod sessions;
mod users;
