/// Delimiter wrapped around every macro token, e.g. `$APP_CONFIG$`
pub const MACRO_DELIMITER: char = '$';

/// Reserved path template of the per-workspace state file
pub const WORKSPACE_FILE: &str = "$WORKSPACE_FILE$";

/// Default root element name written into file storages
pub const DEFAULT_ROOT_TAG: &str = "application";

/// Version recorded in the document prolog
pub const DOCUMENT_FORMAT_VERSION: u32 = 1;

/// Prefix of the prolog line emitted ahead of a storage document
pub const PROLOG_PREFIX: &str = "#!statestore";
