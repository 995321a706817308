//! Command handlers for the CLI

mod user;

pub use user::{
    cmd_user_create, cmd_user_delete, cmd_user_disable, cmd_user_enable, cmd_user_list,
    cmd_user_password,
};
