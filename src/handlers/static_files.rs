//! # Archivos Estáticos
//! src/handlers/static_files.rs
//!
//! El path del request se concatena tal cual al directorio raíz: no hay
//! normalización, ni protección contra `../`, ni resolución de symlinks.
//! El servidor está pensado para uso local o en un entorno de confianza.

use crate::http::Response;
use std::env;
use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Concatena raíz y path sin interpretar ninguno de los dos
///
/// `Path::join` descartaría la raíz cuando el path empieza con `/`, por
/// eso se concatena a nivel de `OsString`.
///
/// ```
/// use std::path::{Path, PathBuf};
/// use cgi_server::handlers::static_files::resolve;
///
/// assert_eq!(resolve(Path::new("/srv/www"), "/index.html"), PathBuf::from("/srv/www/index.html"));
/// ```
pub fn resolve(root: &Path, path: &str) -> PathBuf {
    let mut full: OsString = root.as_os_str().to_os_string();
    full.push(path);
    PathBuf::from(full)
}

/// Vuelve absoluta una raíz relativa respecto del directorio actual
///
/// Los programas CGI corren con la raíz como directorio de trabajo, así que
/// el path del programa tiene que ser válido desde cualquier directorio.
/// Si el directorio actual no se puede leer, la raíz queda como vino.
pub fn absolute_root(root: PathBuf) -> PathBuf {
    if root.is_absolute() {
        return root;
    }

    match env::current_dir() {
        Ok(cwd) => cwd.join(root),
        Err(e) => {
            warn!(root = %root.display(), error = %e, "no se pudo leer el directorio actual");
            root
        }
    }
}

/// Arma la respuesta para un archivo estático
///
/// Si el archivo no se puede abrir (o no es un archivo regular) la
/// respuesta es 404. Si se puede, el body se copia del archivo al socket
/// cuando se escribe la respuesta.
pub fn output_static_file(root: &Path, path: &str) -> Response {
    let full_path = resolve(root, path);
    debug!(file = %full_path.display(), "abriendo archivo estático");

    let file = match File::open(&full_path) {
        Ok(file) => file,
        Err(e) => {
            warn!(file = %full_path.display(), error = %e, "no se pudo abrir el archivo");
            return Response::not_found();
        }
    };

    let metadata = match file.metadata() {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(file = %full_path.display(), error = %e, "no se pudo leer la metadata");
            return Response::not_found();
        }
    };

    if !metadata.is_file() {
        warn!(file = %full_path.display(), "no es un archivo regular");
        return Response::not_found();
    }

    Response::file(file, metadata.len())
}
