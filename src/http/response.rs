//! # Construcción y Escritura de Respuestas
//! src/http/response.rs
//!
//! Toda respuesta tiene la misma forma:
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Server: cgi_server/0.1.0\r\n
//! Content-Type: text/html\r\n
//! Content-Length: 9\r\n
//! \r\n
//! <p>hi</p>
//! ```
//!
//! El `Content-Type` es fijo y el `Content-Length` siempre se calcula a
//! partir del body. Los archivos estáticos no se cargan en memoria: se
//! copian directo del archivo al socket.

use super::{StatusCode, SERVER_SOFTWARE};
use std::fs::File;
use std::io::{self, Read, Write};

/// Body que se envía cuando algo no se encontró (o no se pudo ejecutar)
pub const NOT_FOUND_BODY: &str = "<html><body><h1>Not found</h1></body></html>\r\n";

/// Origen del body de una respuesta
#[derive(Debug)]
pub enum Body {
    /// Bytes ya en memoria (salida de un CGI, página de error)
    Bytes(Vec<u8>),

    /// Archivo abierto con su tamaño conocido
    File { file: File, len: u64 },
}

/// Respuesta HTTP lista para escribirse en la conexión
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    body: Body,
}

impl Response {
    /// Respuesta 200 con un body en memoria
    ///
    /// # Ejemplo
    /// ```
    /// use cgi_server::http::{Response, StatusCode};
    ///
    /// let response = Response::ok(b"<p>hi</p>".to_vec());
    /// assert_eq!(response.status(), StatusCode::Ok);
    /// assert_eq!(response.content_length(), 9);
    /// ```
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: StatusCode::Ok,
            body: Body::Bytes(body),
        }
    }

    /// Respuesta 200 cuyo body se copia desde un archivo abierto
    pub fn file(file: File, len: u64) -> Self {
        Self {
            status: StatusCode::Ok,
            body: Body::File { file, len },
        }
    }

    /// Respuesta 404 con la página de error fija
    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NotFound,
            body: Body::Bytes(NOT_FOUND_BODY.as_bytes().to_vec()),
        }
    }

    /// Obtiene el código de estado de la respuesta
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Cantidad de bytes del body (valor del header `Content-Length`)
    pub fn content_length(&self) -> u64 {
        match &self.body {
            Body::Bytes(bytes) => bytes.len() as u64,
            Body::File { len, .. } => *len,
        }
    }

    /// Status line, headers y línea vacía, en formato de wire
    pub fn head_bytes(&self) -> Vec<u8> {
        format!(
            "HTTP/1.1 {}\r\nServer: {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n",
            self.status,
            SERVER_SOFTWARE,
            self.content_length()
        )
        .into_bytes()
    }

    /// Escribe la respuesta completa y consume el body
    ///
    /// Retorna la cantidad de bytes de body escritos. Si el archivo se
    /// achicó entre `metadata` y la copia, se escriben menos bytes que
    /// `content_length()` y el cliente verá la conexión cerrada antes.
    pub fn write_to<W: Write>(self, writer: &mut W) -> io::Result<u64> {
        writer.write_all(&self.head_bytes())?;

        let written = match self.body {
            Body::Bytes(bytes) => {
                writer.write_all(&bytes)?;
                bytes.len() as u64
            }
            Body::File { file, len } => io::copy(&mut file.take(len), writer)?,
        };

        writer.flush()?;
        Ok(written)
    }
}
