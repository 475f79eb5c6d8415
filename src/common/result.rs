use crate::common::error::MgrError;

/// mcmgr全体で使用するResult型のエイリアス
///
/// # Examples
///
/// ```
/// use mcmgr::common::result::MgrResult;
/// use mcmgr::common::error::MgrError;
///
/// fn check_port(port: u16) -> MgrResult<u16> {
///     if port == 0 {
///         return Err(MgrError::config_error("RCON_PORT is required"));
///     }
///     Ok(port)
/// }
///
/// assert!(check_port(25575).is_ok());
/// assert!(check_port(0).is_err());
/// ```
pub type MgrResult<T> = Result<T, MgrError>;
