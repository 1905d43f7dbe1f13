//! # Programas CGI
//! src/handlers/cgi.rs
//!
//! Ejecuta el programa apuntado por el path y usa su stdout completo como
//! body de la respuesta.
//!
//! ## Invocación
//!
//! ```text
//! GET /cgi-bin/echo.py?x=5   →   QUERY_STRING='x=5' python <raíz>/cgi-bin/echo.py
//! GET /cgi-bin/date          →   <raíz>/cgi-bin/date
//! ```
//!
//! La línea de arriba es sólo la forma en que se loguea. El proceso se
//! lanza con `std::process::Command`: programa, argumentos y entorno van
//! separados y ningún shell vuelve a parsear la query, así que la query
//! no puede inyectar comandos.

use crate::handlers::static_files::{absolute_root, resolve};
use crate::http::{Response, SERVER_SOFTWARE};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Sufijo de los programas que se ejecutan con el intérprete de Python
const PYTHON_SUFFIX: &str = ".py";

/// Path y query de un request, separados por el primer `?`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPair {
    pub path: String,

    /// `None` si no había `?`; `Some("")` si la query estaba vacía
    pub query: Option<String>,
}

/// Separa path y query en el primer `?`
///
/// ```
/// use cgi_server::handlers::cgi::extract_query;
///
/// let pair = extract_query("/foo?x=1&y=2");
/// assert_eq!(pair.path, "/foo");
/// assert_eq!(pair.query.as_deref(), Some("x=1&y=2"));
///
/// assert_eq!(extract_query("/foo/bar").query, None);
/// ```
pub fn extract_query(path_and_query: &str) -> RequestPair {
    match path_and_query.split_once('?') {
        Some((path, query)) => RequestPair {
            path: path.to_string(),
            query: Some(query.to_string()),
        },
        None => RequestPair {
            path: path_and_query.to_string(),
            query: None,
        },
    }
}

/// Errores al ejecutar un programa CGI
///
/// Para el cliente todos son un 404.
#[derive(Debug)]
pub enum CgiError {
    /// El programa (o el script) no existe
    ProgramNotFound(PathBuf),

    /// El sistema operativo no pudo lanzar el proceso
    Spawn(io::Error),

    /// Falló la lectura del stdout del proceso
    Read(io::Error),
}

impl std::fmt::Display for CgiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CgiError::ProgramNotFound(path) => write!(f, "CGI program not found: {}", path.display()),
            CgiError::Spawn(e) => write!(f, "Failed to spawn CGI program: {}", e),
            CgiError::Read(e) => write!(f, "Failed to read CGI output: {}", e),
        }
    }
}

impl std::error::Error for CgiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CgiError::ProgramNotFound(_) => None,
            CgiError::Spawn(e) | CgiError::Read(e) => Some(e),
        }
    }
}

/// Invocación CGI ya armada: programa, intérprete opcional y entorno
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgiCommand {
    program: PathBuf,
    interpreter: Option<String>,
    working_dir: PathBuf,
    env: Vec<(String, String)>,
}

impl CgiCommand {
    /// Arma la invocación para `path_and_query` bajo la raíz `root`
    ///
    /// - Con query: se define `QUERY_STRING` con el valor crudo (sin decodificar)
    /// - Si el path termina en `.py` se ejecuta con `python`
    /// - Si no, el programa es `<root><path>` y se ejecuta directamente
    pub fn build(root: &Path, path_and_query: &str, python: &str) -> Self {
        let RequestPair { path, query } = extract_query(path_and_query);

        let mut env = vec![
            ("GATEWAY_INTERFACE".to_string(), "CGI/1.1".to_string()),
            ("SERVER_SOFTWARE".to_string(), SERVER_SOFTWARE.to_string()),
            ("SERVER_PROTOCOL".to_string(), "HTTP/1.1".to_string()),
            ("REQUEST_METHOD".to_string(), "GET".to_string()),
            ("SCRIPT_NAME".to_string(), path.clone()),
        ];
        if let Some(query) = query {
            env.push(("QUERY_STRING".to_string(), query));
        }

        let interpreter = if path.ends_with(PYTHON_SUFFIX) {
            Some(python.to_string())
        } else {
            None
        };

        Self {
            program: resolve(root, &path),
            interpreter,
            working_dir: root.to_path_buf(),
            env,
        }
    }

    /// Archivo del programa (o del script, si hay intérprete)
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Intérprete con el que se ejecuta el programa, si hay uno
    pub fn interpreter(&self) -> Option<&str> {
        self.interpreter.as_deref()
    }

    /// Valor de una variable de entorno que recibirá el proceso
    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Forma convencional de la invocación, para logs
    ///
    /// `QUERY_STRING='<query>' [python ]<programa>`
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(query) = self.env_var("QUERY_STRING") {
            parts.push(format!("QUERY_STRING='{}'", query));
        }
        if let Some(interpreter) = &self.interpreter {
            parts.push(interpreter.clone());
        }
        parts.push(self.program.display().to_string());
        parts.join(" ")
    }

    /// Construye el `Command` listo para lanzar
    ///
    /// stdin vacío, stdout capturado y stderr heredado (termina en la
    /// consola del servidor).
    pub fn to_command(&self) -> Command {
        let mut command = match &self.interpreter {
            Some(interpreter) => {
                let mut command = Command::new(interpreter);
                command.arg(&self.program);
                command
            }
            None => Command::new(&self.program),
        };

        command
            .current_dir(&self.working_dir)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        command
    }
}

/// Ejecutor de programas CGI bajo una raíz
#[derive(Debug, Clone)]
pub struct CgiInvoker {
    root: PathBuf,
    python: String,
}

impl CgiInvoker {
    /// Crea un ejecutor para la raíz `root` usando `python` como intérprete
    ///
    /// Una raíz relativa se resuelve contra el directorio actual.
    pub fn new(root: impl Into<PathBuf>, python: impl Into<String>) -> Self {
        Self {
            root: absolute_root(root.into()),
            python: python.into(),
        }
    }

    /// Arma la invocación para un path con query
    pub fn command_for(&self, path_and_query: &str) -> CgiCommand {
        CgiCommand::build(&self.root, path_and_query, &self.python)
    }

    /// Ejecuta el programa y arma la respuesta
    ///
    /// Cualquier error (programa inexistente, spawn fallido, error de
    /// lectura) termina en 404. Si no, el stdout completo es el body.
    pub fn run_cgi(&self, path_and_query: &str) -> Response {
        let command = self.command_for(path_and_query);
        info!(command = %command.command_line(), "ejecutando CGI");

        match Self::execute(&command) {
            Ok(output) => Response::ok(output),
            Err(e) => {
                warn!(command = %command.command_line(), error = %e, "CGI falló");
                Response::not_found()
            }
        }
    }

    /// Lanza el proceso, lee su stdout hasta EOF y espera a que termine
    ///
    /// El proceso siempre se espera (aunque falle la lectura) para no
    /// dejar zombies.
    pub fn execute(command: &CgiCommand) -> Result<Vec<u8>, CgiError> {
        if !command.program().is_file() {
            return Err(CgiError::ProgramNotFound(command.program().to_path_buf()));
        }

        let mut child = command.to_command().spawn().map_err(CgiError::Spawn)?;

        let mut output = Vec::new();
        let read = match child.stdout.take() {
            Some(mut stdout) => stdout.read_to_end(&mut output),
            None => Ok(0),
        };

        match child.wait() {
            Ok(status) if !status.success() => {
                warn!(command = %command.command_line(), %status, "CGI terminó con error");
            }
            Ok(status) => {
                debug!(command = %command.command_line(), %status, bytes = output.len(), "CGI terminado");
            }
            Err(e) => {
                warn!(command = %command.command_line(), error = %e, "no se pudo esperar al proceso CGI");
            }
        }

        read.map_err(CgiError::Read)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StatusCode;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cgi_server_cgi_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("cgi-bin")).unwrap();
        dir
    }

    fn write_script(root: &Path, name: &str, body: &str, mode: u32) {
        let path = root.join("cgi-bin").join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    }

    fn body_of(response: Response) -> String {
        let mut out = Vec::new();
        response.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let pos = text.find("\r\n\r\n").unwrap();
        text[pos + 4..].to_string()
    }

    #[test]
    fn test_extract_query_without_query() {
        let pair = extract_query("/foo/bar");
        assert_eq!(pair.path, "/foo/bar");
        assert_eq!(pair.query, None);
    }

    #[test]
    fn test_extract_query_with_query() {
        let pair = extract_query("/foo?x=1&y=2");
        assert_eq!(pair.path, "/foo");
        assert_eq!(pair.query, Some("x=1&y=2".to_string()));
    }

    #[test]
    fn test_extract_query_empty_and_repeated() {
        assert_eq!(extract_query("/foo?").query, Some(String::new()));

        let pair = extract_query("/foo?a=1?b=2");
        assert_eq!(pair.path, "/foo");
        assert_eq!(pair.query.as_deref(), Some("a=1?b=2"));
    }

    #[test]
    fn test_build_python_command() {
        let command = CgiCommand::build(Path::new("/srv"), "/cgi-bin/echo.py?x=5", "python");

        assert_eq!(command.program(), Path::new("/srv/cgi-bin/echo.py"));
        assert_eq!(command.interpreter(), Some("python"));
        assert_eq!(command.env_var("QUERY_STRING"), Some("x=5"));
        assert_eq!(command.env_var("SCRIPT_NAME"), Some("/cgi-bin/echo.py"));
        assert_eq!(command.env_var("REQUEST_METHOD"), Some("GET"));
        assert_eq!(
            command.command_line(),
            "QUERY_STRING='x=5' python /srv/cgi-bin/echo.py"
        );
    }

    #[test]
    fn test_build_direct_command_without_query() {
        let command = CgiCommand::build(Path::new("/srv"), "/cgi-bin/date", "python");

        assert_eq!(command.interpreter(), None);
        assert_eq!(command.env_var("QUERY_STRING"), None);
        assert_eq!(command.command_line(), "/srv/cgi-bin/date");
    }

    #[test]
    fn test_empty_query_is_still_passed() {
        let command = CgiCommand::build(Path::new("/srv"), "/cgi-bin/date?", "python");
        assert_eq!(command.env_var("QUERY_STRING"), Some(""));
    }

    #[test]
    fn test_run_executable_script() {
        let root = temp_root("exec");
        write_script(&root, "echo.sh", "#!/bin/sh\nprintf 'q=%s' \"$QUERY_STRING\"\n", 0o755);

        let invoker = CgiInvoker::new(&root, "python");
        let response = invoker.run_cgi("/cgi-bin/echo.sh?x=5&y=6");

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(body_of(response), "q=x=5&y=6");

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_relative_root_runs_programs() {
        let relative = PathBuf::from(format!(".cgi_server_relative_{}", std::process::id()));
        let _ = fs::remove_dir_all(&relative);
        fs::create_dir_all(relative.join("cgi-bin")).unwrap();
        write_script(&relative, "echo.py", "printf 'q=%s' \"$QUERY_STRING\"\n", 0o644);
        write_script(&relative, "hello", "#!/bin/sh\necho hello\n", 0o755);

        let invoker = CgiInvoker::new(&relative, "sh");
        assert!(invoker.command_for("/cgi-bin/hello").program().is_absolute());

        let response = invoker.run_cgi("/cgi-bin/echo.py?x=5");
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(body_of(response), "q=x=5");

        let response = invoker.run_cgi("/cgi-bin/hello");
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(body_of(response), "hello\n");

        let _ = fs::remove_dir_all(&relative);
    }

    #[test]
    fn test_run_with_interpreter() {
        let root = temp_root("interp");
        // Un ".py" con contenido de shell: el intérprete configurado es `sh`
        write_script(&root, "echo.py", "echo \"$QUERY_STRING\"\n", 0o644);

        let invoker = CgiInvoker::new(&root, "sh");
        let response = invoker.run_cgi("/cgi-bin/echo.py?x=5");

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(body_of(response), "x=5\n");

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_query_is_not_interpreted_by_a_shell() {
        let root = temp_root("inject");
        write_script(&root, "echo.sh", "#!/bin/sh\nprintf '%s' \"$QUERY_STRING\"\n", 0o755);
        let marker = root.join("pwned");

        let invoker = CgiInvoker::new(&root, "python");
        let query = format!("x';touch {};'", marker.display());
        let response = invoker.run_cgi(&format!("/cgi-bin/echo.sh?{}", query));

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(body_of(response), query);
        assert!(!marker.exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_missing_program_is_not_found() {
        let root = temp_root("missing");
        let invoker = CgiInvoker::new(&root, "python");

        assert_eq!(invoker.run_cgi("/cgi-bin/nope").status(), StatusCode::NotFound);
        assert_eq!(invoker.run_cgi("/cgi-bin/nope.py?x=1").status(), StatusCode::NotFound);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_unexecutable_program_is_not_found() {
        let root = temp_root("noexec");
        write_script(&root, "plain.sh", "#!/bin/sh\necho hi\n", 0o644);

        let invoker = CgiInvoker::new(&root, "python");
        assert_eq!(invoker.run_cgi("/cgi-bin/plain.sh").status(), StatusCode::NotFound);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_missing_interpreter_is_not_found() {
        let root = temp_root("nointerp");
        write_script(&root, "echo.py", "print('hi')\n", 0o644);

        let invoker = CgiInvoker::new(&root, "definitely-not-an-interpreter");
        assert_eq!(invoker.run_cgi("/cgi-bin/echo.py").status(), StatusCode::NotFound);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_failing_program_output_is_kept() {
        let root = temp_root("failing");
        write_script(&root, "fail.sh", "#!/bin/sh\necho partial\nexit 3\n", 0o755);

        let invoker = CgiInvoker::new(&root, "python");
        let response = invoker.run_cgi("/cgi-bin/fail.sh");

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(body_of(response), "partial\n");

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_large_output_is_read_completely() {
        let root = temp_root("large");
        write_script(
            &root,
            "big.sh",
            "#!/bin/sh\ni=0\nwhile [ $i -lt 2000 ]; do echo 0123456789012345678901234567890123456789; i=$((i+1)); done\n",
            0o755,
        );

        let invoker = CgiInvoker::new(&root, "python");
        let response = invoker.run_cgi("/cgi-bin/big.sh");

        assert_eq!(response.content_length(), 2000 * 41);

        let _ = fs::remove_dir_all(&root);
    }
}
