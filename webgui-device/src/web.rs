//! Web portal
//!
//! Serves the embedded pages with template substitution, applies settings
//! forms, exposes the variable REST API and the SysComm message endpoint.
//!
//! Routes:
//! - `GET /api/var?name=<alias>` / `POST /api/var` with `name` and `value`
//! - `POST /api/syscomm` signed JSON envelope
//! - `POST /save`, `POST /reset`, `POST /reboot`
//! - `GET /*` page or asset, `POST /*` settings form

use anyhow::anyhow;
use embedded_svc::http::server::Request;
use embedded_svc::http::Method;
use embedded_svc::io::{Read, Write};
use esp_idf_svc::http::server::{Configuration as HttpConfig, EspHttpConnection, EspHttpServer};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};

use webgui_rs::form::{apply_form, parse_form, REBOOT_PAGE};
use webgui_rs::store::ConfigStore;
use webgui_rs::syscomm::SysComm;
use webgui_rs::template::fs::{path_from_uri, query_from_uri};
use webgui_rs::template::{content_type_for, render_page, EmbeddedFs, TemplateResolver};
use webgui_rs::vars::VariableRegistry;
use webgui_rs::{DeviceState, SystemConfig};

use crate::nvs_store::NvsStore;

/// Web server port
const WEB_PORT: u16 = 80;

/// Largest settings form body accepted
const MAX_FORM_BODY: usize = 4096;

/// Shared state for web handlers
pub struct WebState {
    pub device: Mutex<DeviceState>,
    pub registry: VariableRegistry<DeviceState>,
    pub resolver: TemplateResolver<DeviceState>,
    pub syscomm: Mutex<SysComm>,
    pub store: Mutex<NvsStore>,
    pub fs: Arc<dyn EmbeddedFs>,
}

impl WebState {
    /// Persist the current configuration
    fn save(&self) -> anyhow::Result<()> {
        let config = lock(&self.device)?.config.clone();
        lock(&self.store)?.save(&config)?;
        Ok(())
    }

    /// Drop the stored configuration and return to factory settings
    fn reset(&self) -> anyhow::Result<()> {
        lock(&self.store)?.clear()?;
        lock(&self.device)?.config = SystemConfig::default();
        Ok(())
    }

    fn render(&self, path: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let Some(template) = self.fs.open(path) else {
            return Ok(None);
        };
        let device = lock(&self.device)?;
        Ok(Some(render_page(&self.resolver, &device, template)))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> anyhow::Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| anyhow!("shared state lock poisoned"))
}

/// Read the request body, stopping once it exceeds `limit` bytes
fn read_body<R: Read>(req: &mut R, limit: usize) -> anyhow::Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut chunk = [0u8; 256];
    while body.len() <= limit {
        let n = req
            .read(&mut chunk)
            .map_err(|e| anyhow!("failed to read request body: {:?}", e))?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Ok(body)
}

fn form_value(pairs: &[(String, String)], key: &str) -> String {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
        .unwrap_or_default()
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        303 => "See Other",
        400 => "Bad Request",
        404 => "Not Found",
        413 => "Payload Too Large",
        _ => "Internal Server Error",
    }
}

fn send(
    req: Request<&mut EspHttpConnection<'_>>,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> anyhow::Result<()> {
    let mut resp = req.into_response(status, Some(status_text(status)), &[("Content-Type", content_type)])?;
    resp.write_all(body)?;
    Ok(())
}

fn redirect(req: Request<&mut EspHttpConnection<'_>>, location: &str) -> anyhow::Result<()> {
    req.into_response(303, Some(status_text(303)), &[("Location", location)])?;
    Ok(())
}

fn not_found(req: Request<&mut EspHttpConnection<'_>>) -> anyhow::Result<()> {
    send(req, 404, "text/plain", b"Not Found")
}

/// Minimal HTML escaping for text echoed back into a page
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Message block listing the refused form fields
fn rejection_notice(aliases: &[&str]) -> String {
    let names: Vec<String> = aliases.iter().map(|a| escape_html(a)).collect();
    format!(
        "<p class=\"error\">Not saved, invalid value for: {}</p>",
        names.join(", ")
    )
}

/// Put `notice` at the top of the page body
fn insert_notice(page: &mut Vec<u8>, notice: &str) {
    const ANCHOR: &[u8] = b"<main>";
    let at = page
        .windows(ANCHOR.len())
        .position(|w| w == ANCHOR)
        .map_or(0, |i| i + ANCHOR.len());
    page.splice(at..at, notice.bytes());
}

/// Page path for a request URI; `/` serves the index page
fn page_path(uri: &str) -> String {
    match path_from_uri(uri) {
        "" | "/" => "/index.html".to_string(),
        path => path.to_string(),
    }
}

/// Start the web server
pub fn start_web_server(state: Arc<WebState>) -> anyhow::Result<EspHttpServer<'static>> {
    let http_config = HttpConfig {
        http_port: WEB_PORT,
        uri_match_wildcard: true,
        ..Default::default()
    };

    let mut server = EspHttpServer::new(&http_config)?;
    info!("Web server starting on port {}", WEB_PORT);

    // Variable read
    let st = Arc::clone(&state);
    server.fn_handler("/api/var", Method::Get, move |req| {
        let pairs = parse_form(query_from_uri(req.uri()).unwrap_or(""));
        let name = form_value(&pairs, "name");
        let reply = {
            let device = lock(&st.device)?;
            st.registry.rest_get(&device, &name)
        };
        debug!("GET var '{}' -> {}", name, reply.status());
        send(req, reply.status(), "application/json", reply.to_json().as_bytes())
    })?;

    // Variable write; parameters in the body or the query string
    let st = Arc::clone(&state);
    server.fn_handler("/api/var", Method::Post, move |mut req| {
        let body = read_body(&mut req, MAX_FORM_BODY)?;
        let mut pairs = parse_form(&String::from_utf8_lossy(&body));
        if pairs.is_empty() {
            pairs = parse_form(query_from_uri(req.uri()).unwrap_or(""));
        }
        let name = form_value(&pairs, "name");
        let value = form_value(&pairs, "value");
        let reply = {
            let mut device = lock(&st.device)?;
            st.registry.rest_set(&mut device, &name, &value)
        };
        if !reply.is_ok() {
            warn!("SET var '{}' rejected: {:?}", name, reply.error_descr);
        }
        send(req, reply.status(), "application/json", reply.to_json().as_bytes())
    })?;

    // Signed system messages
    let st = Arc::clone(&state);
    server.fn_handler("/api/syscomm", Method::Post, move |mut req| {
        let limit = lock(&st.syscomm)?.config().max_message_size;
        let body = read_body(&mut req, limit)?;
        let key = lock(&st.device)?.config.message_key.as_bytes().to_vec();
        let reply = {
            let mut syscomm = lock(&st.syscomm)?;
            if syscomm.config().key != key {
                syscomm.set_key(key);
            }
            syscomm.handle(&body)
        };
        debug!("SysComm reply: {}", reply.code);
        send(req, 200, "application/json", reply.body.as_bytes())
    })?;

    // Save configuration to NVS
    let st = Arc::clone(&state);
    server.fn_handler("/save", Method::Post, move |req| {
        match st.save() {
            Ok(()) => {
                info!("Configuration saved via web portal");
                redirect(req, REBOOT_PAGE)
            }
            Err(e) => {
                error!("Failed to save config: {}", e);
                send(req, 500, "text/plain", b"Error saving configuration")
            }
        }
    })?;

    // Reset configuration to defaults
    let st = Arc::clone(&state);
    server.fn_handler("/reset", Method::Post, move |req| {
        if let Err(e) = st.reset() {
            error!("Failed to reset config: {}", e);
            return send(req, 500, "text/plain", b"Error resetting configuration");
        }
        info!("Configuration reset to defaults via web portal");
        redirect(req, REBOOT_PAGE)
    })?;

    // Reboot device
    let st = Arc::clone(&state);
    server.fn_handler("/reboot", Method::Post, move |req| {
        info!("Reboot requested via web portal");
        let page = st.render(REBOOT_PAGE)?.unwrap_or_else(|| b"Rebooting...".to_vec());
        send(req, 200, "text/html", &page)?;

        // Schedule reboot after response is sent
        std::thread::spawn(|| {
            std::thread::sleep(std::time::Duration::from_secs(2));
            // SAFETY: esp_restart() performs a software reset and never returns.
            unsafe {
                esp_idf_svc::sys::esp_restart();
            }
        });
        Ok::<(), anyhow::Error>(())
    })?;

    // Pages and static assets
    let st = Arc::clone(&state);
    server.fn_handler("/*", Method::Get, move |req| {
        let path = page_path(req.uri());
        let content_type = content_type_for(&path);
        if content_type == "text/html" {
            return match st.render(&path)? {
                Some(page) => send(req, 200, content_type, &page),
                None => not_found(req),
            };
        }
        match st.fs.open(&path) {
            Some(data) => send(req, 200, content_type, data),
            None => {
                debug!("No file for {}", path);
                not_found(req)
            }
        }
    })?;

    // Settings forms
    let st = Arc::clone(&state);
    server.fn_handler("/*", Method::Post, move |mut req| {
        let path = page_path(req.uri());
        if !st.fs.exists(&path) {
            return not_found(req);
        }
        let body = read_body(&mut req, MAX_FORM_BODY)?;
        if body.len() > MAX_FORM_BODY {
            return send(req, 413, "text/plain", b"Form too large");
        }

        let outcome = {
            let mut device = lock(&st.device)?;
            apply_form(&st.registry, &mut device, &String::from_utf8_lossy(&body))
        };
        info!(
            "{}: {} field(s) applied, {} rejected",
            path,
            outcome.applied.len(),
            outcome.rejected.len()
        );

        if let Some(location) = outcome.redirect() {
            if let Err(e) = st.save() {
                error!("Failed to save config: {}", e);
                return send(req, 500, "text/plain", b"Error saving configuration");
            }
            return redirect(req, location);
        }

        let Some(mut page) = st.render(&path)? else {
            return not_found(req);
        };
        if outcome.is_clean() {
            return send(req, 200, "text/html", &page);
        }
        if outcome.save_requested {
            warn!("Save skipped, {} field(s) rejected", outcome.rejected.len());
        }
        insert_notice(&mut page, &rejection_notice(&outcome.rejected_aliases()));
        send(req, 400, "text/html", &page)
    })?;

    info!("Web server started");
    Ok(server)
}

