// Constants for the Mila translator

/// Name of the callable synthesized from the main body
pub const MAIN_FUNCTION: &str = "main";

/// Suffix of a function's hidden result variable, `<name>_return`
pub const RETURN_SUFFIX: &str = "_return";

/// Format string behind `writeln(e)`
pub const FMT_WRITELN: &str = "%d\n";

/// Format string behind `readln(v)`
pub const FMT_READLN: &str = "%d";

/// Format string behind `write('text')`
pub const FMT_WRITE: &str = "%s";

/// Name given to interned string literals and format strings
pub const STRING_GLOBAL: &str = ".str";

/// Runtime functions the built-ins call into
pub const PRINTF: &str = "printf";
pub const SCANF: &str = "scanf";

// Basic block names
pub const BLOCK_BODY: &str = "body";
pub const BLOCK_THEN: &str = "then";
pub const BLOCK_ELSE: &str = "else";
pub const BLOCK_MERGE: &str = "ifcont";
pub const BLOCK_COND: &str = "condblock";
pub const BLOCK_LOOP: &str = "loop";
pub const BLOCK_AFTER: &str = "afterloop";

/// Hidden result variable of the callable `name`
pub fn return_slot(name: &str) -> String {
    format!("{}{}", name, RETURN_SUFFIX)
}
