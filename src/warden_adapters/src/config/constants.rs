/// Settings file, without extension; any format `config` understands.
pub const CONFIG_FILE: &str = "config/warden";

pub mod env {
    pub const PREFIX: &str = "WARDEN";
    pub const SEPARATOR: &str = "__";
    pub const LIST_SEPARATOR: &str = ",";
}

pub mod handlers {
    pub const PASSWORD_HANDLER_NAME: &str = "password";
    pub const JWT_HANDLER_NAME: &str = "jwt";
}

pub mod argon2 {
    pub const MEMORY_COST_KIB: u32 = 15000;
    pub const ITERATIONS: u32 = 2;
    pub const PARALLELISM: u32 = 1;
}
