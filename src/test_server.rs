//! One-shot HTTP server on 127.0.0.1 for exercising the ureq clients
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use url::Url;

/// What the client sent
pub struct Captured {
    /// Request line and headers
    pub head: String,
    pub body: String,
}

impl Captured {
    /// Decoded query pairs of the request target
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let target = self
            .head
            .lines()
            .next()
            .and_then(|line| line.split(' ').nth(1))
            .unwrap();
        Url::parse(&format!("http://127.0.0.1{}", target))
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        let prefix = format!("{}:", name.to_ascii_lowercase());
        self.head.lines().find_map(|line| {
            if line.to_ascii_lowercase().starts_with(&prefix) {
                Some(line[prefix.len()..].trim().to_string())
            } else {
                None
            }
        })
    }
}

/// Answer exactly one request with `response`
pub fn serve_once(path: &str, response: String) -> (Url, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut head = String::new();
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line.trim_end().is_empty() {
                break;
            }
            if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap();
            }
            head.push_str(&line);
        }
        let mut body = vec![0; content_length];
        reader.read_exact(&mut body).unwrap();
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
        Captured {
            head,
            body: String::from_utf8(body).unwrap(),
        }
    });
    let url = Url::parse(&format!("http://127.0.0.1:{}{}", port, path)).unwrap();
    (url, handle)
}

/// A port nothing listens on
pub fn closed_url(path: &str) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Url::parse(&format!("http://127.0.0.1:{}{}", port, path)).unwrap()
}

pub fn http_response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
    let headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}: {}\r\n", name, value))
        .collect();
    format!(
        "HTTP/1.1 {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        headers,
        body.len(),
        body
    )
}
