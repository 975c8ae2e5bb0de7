//! HTTP handling for the provisioning portal.

use core::net::Ipv4Addr;

use alloc::string::String;
use alloc::vec::Vec;

use crate::storage::Credential;

/// Address of the device on its own access point.
pub const PORTAL_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalRoute {
    /// Form submission with network credentials.
    Configure,
    /// Anything else, including OS captive-portal probes.
    SetupPage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub route: PortalRoute,
    pub body: &'a [u8],
}

impl<'a> PortalRequest<'a> {
    /// Parses a raw request. Returns `None` for anything that is not HTTP.
    pub fn parse(raw: &'a [u8]) -> Option<Self> {
        let (head, body) = match raw.windows(4).position(|w| w == b"\r\n\r\n") {
            Some(end) => (&raw[..end], &raw[end + 4..]),
            None => (raw, &raw[raw.len()..]),
        };

        let head = core::str::from_utf8(head).ok()?;
        let mut request_line = head.lines().next()?.split_whitespace();
        let method = request_line.next()?;
        let target = request_line.next()?;
        if !request_line.next()?.starts_with("HTTP") {
            return None;
        }

        let path = target
            .split('?')
            .next()
            .unwrap_or_default()
            .trim_matches('/');
        let route = match path {
            "configure" => PortalRoute::Configure,
            _ => PortalRoute::SetupPage,
        };

        Some(Self {
            method,
            path,
            route,
            body: trim_trailing_nuls(body),
        })
    }
}

fn trim_trailing_nuls(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormError {
    MissingParameters,
    EmptySsid,
}

impl FormError {
    pub fn message(&self) -> &'static str {
        match self {
            FormError::MissingParameters => "Parameters not found",
            FormError::EmptySsid => "SSID must be provided",
        }
    }
}

/// Extracts credentials from an urlencoded form body.
///
/// A network picked from the list (`ssid`) wins over a typed-in name
/// (`other_ssid`); whichever is non-empty is used.
pub fn decode_credentials(body: &[u8]) -> Result<Credential, FormError> {
    let body = String::from_utf8_lossy(body);
    let mut picked = None;
    let mut typed = None;
    let mut password = None;

    for pair in body.trim_end_matches(['\r', '\n']).split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match url_decode(key).as_str() {
            "ssid" => picked = Some(url_decode(value)),
            "other_ssid" => typed = Some(url_decode(value)),
            "password" => password = Some(url_decode(value)),
            _ => {}
        }
    }

    if picked.is_none() && typed.is_none() {
        return Err(FormError::MissingParameters);
    }
    let ssid = [picked, typed]
        .into_iter()
        .flatten()
        .find(|ssid| !ssid.is_empty())
        .ok_or(FormError::EmptySsid)?;
    let password = password.ok_or(FormError::MissingParameters)?;
    Ok(Credential::new(ssid, password))
}

/// Decodes `+` and `%XX` escapes. Malformed escapes are kept verbatim.
pub fn url_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                decoded.push(b' ');
                i += 1;
            }
            b'%' => match (bytes.get(i + 1).and_then(hex_value), bytes.get(i + 2).and_then(hex_value)) {
                (Some(high), Some(low)) => {
                    decoded.push(high << 4 | low);
                    i += 3;
                }
                _ => {
                    decoded.push(b'%');
                    i += 1;
                }
            },
            byte => {
                decoded.push(byte);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_value(byte: &u8) -> Option<u8> {
    (*byte as char).to_digit(16).map(|digit| digit as u8)
}

pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

const PAGE_HEAD: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
<title>CritterCam setup</title></head><body>";
const PAGE_TAIL: &str = "</body></html>";

/// Network picker listing every visible SSID once, in sorted order.
pub fn render_setup_page(ssids: &[String]) -> String {
    let mut ssids: Vec<&str> = ssids
        .iter()
        .map(String::as_str)
        .filter(|ssid| !ssid.is_empty())
        .collect();
    ssids.sort_unstable();
    ssids.dedup();

    let mut page = String::from(PAGE_HEAD);
    page.push_str("<h1>CritterCam WiFi setup</h1><form action=\"/configure\" method=\"post\">");
    if ssids.is_empty() {
        page.push_str("<p>No networks found.</p>");
    }
    for ssid in ssids {
        let ssid = html_escape(ssid);
        page.push_str(&alloc::format!(
            "<label><input type=\"radio\" name=\"ssid\" value=\"{0}\">{0}</label><br>",
            ssid
        ));
    }
    page.push_str(
        "<label>Other network <input type=\"text\" name=\"other_ssid\" value=\"\"></label><br>\
<label>Password <input type=\"password\" name=\"password\"></label><br>\
<input type=\"submit\" value=\"Connect\"></form>",
    );
    page.push_str(PAGE_TAIL);
    page
}

pub fn render_result_page(ssid: &str, connected: bool) -> String {
    let ssid = html_escape(ssid);
    let message = if connected {
        alloc::format!("<h1>Connected</h1><p>CritterCam joined <b>{}</b> and will resume its schedule.</p>", ssid)
    } else {
        alloc::format!(
            "<h1>Could not connect</h1><p>Joining <b>{}</b> failed. <a href=\"/\">Try again</a>.</p>",
            ssid
        )
    };
    let mut page = String::from(PAGE_HEAD);
    page.push_str(&message);
    page.push_str(PAGE_TAIL);
    page
}

pub fn http_response(status: u16, body: &str) -> Vec<u8> {
    let (reason, content_type) = match status {
        200 => ("OK", "text/html"),
        400 => ("Bad Request", "text/plain"),
        404 => ("Not Found", "text/plain"),
        _ => ("Internal Server Error", "text/plain"),
    };
    alloc::format!(
        "HTTP/1.0 {} {}\r\nContent-Type: {}; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        content_type,
        body.len(),
        body
    )
    .into_bytes()
}
