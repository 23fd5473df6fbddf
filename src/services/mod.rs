/// Bundled collaborator modules. Operating-system services reach the
/// language through the same builtin registration interface the standard
/// library and FFI use; these two modules are the in-tree consumers of it
/// (file handles feed the file method table, time feeds benchmarks).
///
/// Every module exposes `register(interp)` which installs its builtins via
/// `Interpreter::register_builtin`.
pub mod fs;
pub mod time;
