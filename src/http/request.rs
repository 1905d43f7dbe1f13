//! # Parsing de Requests
//! src/http/request.rs
//!
//! Parser mínimo: sólo interesa la request line.
//!
//! ```text
//! GET /cgi-bin/echo.py?x=5 HTTP/1.1\r\n
//! Host: localhost:8000\r\n
//! \r\n
//! ```
//!
//! El método debe ser exactamente `GET` seguido de un espacio; el path es
//! lo que queda entre ese espacio y el siguiente. Los headers se ignoran.

use std::io::{self, Read};

/// Token con el que debe empezar todo request aceptado
const GET_PREFIX: &str = "GET ";

/// Máximo de bytes que se leen de un request
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Errores que pueden ocurrir durante el parsing
///
/// Todos terminan en un 404 para el cliente; la variante sólo sirve
/// para el log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Request vacío (el cliente cerró sin mandar nada)
    EmptyRequest,

    /// Método distinto de GET
    UnsupportedMethod(String),

    /// La request line no tiene un espacio después del path
    InvalidRequestLine,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::EmptyRequest => write!(f, "Empty request"),
            ParseError::UnsupportedMethod(m) => write!(f, "Unsupported HTTP method: {}", m),
            ParseError::InvalidRequestLine => write!(f, "Invalid request line format"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Request parseado: método y path crudo (incluye la query si existe)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    path: String,
}

impl Request {
    /// Parsea un request desde los bytes leídos del socket
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use cgi_server::http::Request;
    ///
    /// let request = Request::parse(b"GET /index.html?v=2 HTTP/1.1\r\n\r\n").unwrap();
    /// assert_eq!(request.method(), "GET");
    /// assert_eq!(request.path(), "/index.html?v=2");
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        let text = String::from_utf8_lossy(buffer);

        if text.trim().is_empty() {
            return Err(ParseError::EmptyRequest);
        }

        if !is_get(&text) {
            let token = text.split_whitespace().next().unwrap_or_default();
            return Err(ParseError::UnsupportedMethod(token.to_string()));
        }

        let path = get_path(&text)?;

        Ok(Request {
            method: "GET".to_string(),
            path: path.to_string(),
        })
    }

    /// Obtiene el método HTTP del request
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Obtiene el path crudo, con la query incluida
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Verifica si el texto empieza con `GET ` (método + espacio)
///
/// ```
/// use cgi_server::http::request::is_get;
///
/// assert!(is_get("GET / HTTP/1.1"));
/// assert!(!is_get("POST / HTTP/1.1"));
/// assert!(!is_get("GETX / HTTP/1.1"));
/// ```
pub fn is_get(text: &str) -> bool {
    text.starts_with(GET_PREFIX)
}

/// Extrae el path de un request GET
///
/// El path es lo que está entre el espacio que sigue a `GET` y el próximo
/// espacio de la request line. Si no hay un segundo espacio el request está
/// malformado y se retorna `ParseError::InvalidRequestLine`.
pub fn get_path(text: &str) -> Result<&str, ParseError> {
    let rest = text.strip_prefix(GET_PREFIX).ok_or_else(|| {
        let token = text.split_whitespace().next().unwrap_or_default();
        ParseError::UnsupportedMethod(token.to_string())
    })?;

    // Sólo se busca dentro de la request line
    let line = rest.lines().next().unwrap_or_default();

    match line.find(' ') {
        Some(end) => Ok(&line[..end]),
        None => Err(ParseError::InvalidRequestLine),
    }
}

/// Lee el texto del request desde la conexión
///
/// Lee hasta encontrar el fin de los headers (`\r\n\r\n`), hasta que el
/// cliente cierre su lado, o hasta `MAX_REQUEST_BYTES`.
pub fn read_request_text<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];

    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);

        if buffer.len() >= MAX_REQUEST_BYTES {
            buffer.truncate(MAX_REQUEST_BYTES);
            break;
        }
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    Ok(buffer)
}
