use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::config::BrowserConfig;
use crate::error::{CheckerError, Result};
use crate::video::{PageSnapshot, PageState, VideoLocation, PAGE_STATE_SCRIPT};
use crate::watch::LocationSource;

/// Page info from CDP /json/list endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub page_type: String,
    pub web_socket_debugger_url: Option<String>,
}

/// Connection to a browser exposing the DevTools protocol
#[derive(Debug, Clone)]
pub struct CdpSession {
    host: String,
    port: u16,
    client: reqwest::Client,
}

impl CdpSession {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        // CDP lives on localhost; never route it through a proxy
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CheckerError::CdpConnectionFailed(e.to_string()))?;

        Ok(Self {
            host: host.to_string(),
            port,
            client,
        })
    }

    pub fn from_config(config: &BrowserConfig) -> Result<Self> {
        Self::new(&config.cdp_host, config.cdp_port)
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn http_url(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.host, self.port, path)
    }

    /// Check if the debugging port answers
    pub async fn is_alive(&self) -> bool {
        self.client
            .get(self.http_url("/json/version"))
            .send()
            .await
            .is_ok()
    }

    /// Get list of pages from the browser
    pub async fn get_pages(&self) -> Result<Vec<PageInfo>> {
        let response = self
            .client
            .get(self.http_url("/json/list"))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    CheckerError::BrowserNotRunning(self.endpoint())
                } else {
                    CheckerError::CdpConnectionFailed(format!("Failed to get pages: {}", e))
                }
            })?;

        let pages: Vec<PageInfo> = response.json().await.map_err(|e| {
            CheckerError::CdpConnectionFailed(format!("Failed to parse pages: {}", e))
        })?;

        // Filter to only include actual pages (not extensions, service workers, etc.)
        Ok(pages
            .into_iter()
            .filter(|p| p.page_type == "page")
            .collect())
    }

    /// Current info of one target; `PageClosed` once it is gone
    pub async fn page_info(&self, target_id: &str) -> Result<PageInfo> {
        self.get_pages()
            .await?
            .into_iter()
            .find(|p| p.id == target_id)
            .ok_or_else(|| CheckerError::PageClosed(target_id.to_string()))
    }

    /// Attach to the tab most likely to be the one the user is watching
    pub async fn attach(&self) -> Result<CdpPage> {
        let page = select_page(self.get_pages().await?).ok_or(CheckerError::NoPageFound)?;
        tracing::debug!("Attached to page {} ({})", page.id, page.url);
        Ok(CdpPage {
            session: self.clone(),
            target_id: page.id,
        })
    }

    pub async fn attach_to(&self, target_id: &str) -> Result<CdpPage> {
        let page = self.page_info(target_id).await?;
        Ok(CdpPage {
            session: self.clone(),
            target_id: page.id,
        })
    }

    /// Execute JavaScript on a page using direct CDP via WebSocket
    pub async fn eval_on_page(&self, page: &PageInfo, expression: &str) -> Result<serde_json::Value> {
        let ws_url = page
            .web_socket_debugger_url
            .as_deref()
            .ok_or_else(|| CheckerError::CdpConnectionFailed("No WebSocket URL".to_string()))?;

        let (mut ws, _) = connect_async(ws_url).await.map_err(|e| {
            CheckerError::CdpConnectionFailed(format!("WebSocket connection failed: {}", e))
        })?;

        let cmd = serde_json::json!({
            "id": 1,
            "method": "Runtime.evaluate",
            "params": {
                "expression": expression,
                "returnByValue": true
            }
        });

        ws.send(Message::Text(cmd.to_string().into()))
            .await
            .map_err(|e| CheckerError::Other(format!("Failed to send command: {}", e)))?;

        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let response: serde_json::Value = serde_json::from_str(text.as_str())?;
                    if response.get("id") == Some(&serde_json::json!(1)) {
                        if let Some(error) = response.get("error") {
                            return Err(CheckerError::JavaScriptError(error.to_string()));
                        }
                        let result = response.get("result");
                        if let Some(details) = result.and_then(|r| r.get("exceptionDetails")) {
                            return Err(CheckerError::JavaScriptError(details.to_string()));
                        }
                        return Ok(result
                            .and_then(|r| r.get("result"))
                            .and_then(|r| r.get("value"))
                            .cloned()
                            .unwrap_or(serde_json::Value::Null));
                    }
                }
                Ok(_) => continue,
                Err(e) => return Err(CheckerError::Other(format!("WebSocket error: {}", e))),
            }
        }

        Err(CheckerError::Other("No response received".to_string()))
    }
}

/// Prefer a video page, then any bilibili page, then whatever comes first.
pub fn select_page(pages: Vec<PageInfo>) -> Option<PageInfo> {
    let video = pages
        .iter()
        .position(|p| VideoLocation::parse(&p.url).is_video());
    let bilibili = pages.iter().position(|p| p.url.contains("bilibili.com"));

    let index = video.or(bilibili).or((!pages.is_empty()).then_some(0))?;
    pages.into_iter().nth(index)
}

/// One browser tab, followed by target id across navigations
#[derive(Debug, Clone)]
pub struct CdpPage {
    session: CdpSession,
    target_id: String,
}

impl CdpPage {
    pub fn target_id(&self) -> &str {
        &self.target_id
    }
}

#[async_trait]
impl LocationSource for CdpPage {
    async fn current_location(&self) -> Result<String> {
        Ok(self.session.page_info(&self.target_id).await?.url)
    }
}

#[async_trait]
impl PageState for CdpPage {
    async fn snapshot(&self) -> Result<PageSnapshot> {
        let info = self.session.page_info(&self.target_id).await?;
        let value = self.session.eval_on_page(&info, PAGE_STATE_SCRIPT).await?;
        if value.is_null() {
            // Script blocked or page mid-load; the URL alone still identifies the video
            return Ok(PageSnapshot::from_location(info.url));
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::test_server;
    use tokio::net::TcpListener;

    fn page(id: &str, url: &str) -> PageInfo {
        PageInfo {
            id: id.to_string(),
            title: String::new(),
            url: url.to_string(),
            page_type: "page".to_string(),
            web_socket_debugger_url: None,
        }
    }

    fn session_for(base_url: &str) -> CdpSession {
        let port = base_url.rsplit(':').next().unwrap().parse().unwrap();
        CdpSession::new("127.0.0.1", port).unwrap()
    }

    /// Answers one Runtime.evaluate with `reply`.
    async fn cdp_target(reply: serde_json::Value) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    let request: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                    assert_eq!(request["method"], "Runtime.evaluate");
                    assert_eq!(request["params"]["returnByValue"], true);
                    let response = serde_json::json!({ "id": request["id"], "result": reply });
                    ws.send(Message::Text(response.to_string().into()))
                        .await
                        .unwrap();
                    break;
                }
            }
        });
        format!("ws://127.0.0.1:{}/devtools/page/T1", port)
    }

    #[test]
    fn prefers_video_pages() {
        let pages = vec![
            page("a", "https://example.com/"),
            page("b", "https://www.bilibili.com/"),
            page("c", "https://www.bilibili.com/video/BV1HP411D7Rj"),
        ];
        assert_eq!(select_page(pages).unwrap().id, "c");
    }

    #[test]
    fn falls_back_to_bilibili_then_first() {
        let pages = vec![page("a", "https://example.com/"), page("b", "https://www.bilibili.com/")];
        assert_eq!(select_page(pages).unwrap().id, "b");

        let pages = vec![page("a", "https://example.com/"), page("b", "about:blank")];
        assert_eq!(select_page(pages).unwrap().id, "a");

        assert!(select_page(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn lists_only_page_targets() {
        let server = test_server::serve(
            200,
            r#"[
                {"id":"W1","title":"sw","url":"https://www.bilibili.com/sw.js","type":"service_worker"},
                {"id":"T1","title":"video","url":"https://www.bilibili.com/video/BV1HP411D7Rj","type":"page","webSocketDebuggerUrl":"ws://127.0.0.1:1/devtools/page/T1"}
            ]"#,
        )
        .await;
        let session = session_for(&server.base_url);

        let pages = session.get_pages().await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].id, "T1");
        assert_eq!(server.requests(), ["GET /json/list HTTP/1.1"]);

        let tab = session.attach().await.unwrap();
        assert_eq!(tab.target_id(), "T1");
        assert_eq!(
            tab.current_location().await.unwrap(),
            "https://www.bilibili.com/video/BV1HP411D7Rj"
        );
    }

    #[tokio::test]
    async fn closed_target_is_reported() {
        let server = test_server::serve(200, "[]").await;
        let session = session_for(&server.base_url);

        assert!(matches!(
            session.page_info("gone").await,
            Err(CheckerError::PageClosed(id)) if id == "gone"
        ));
        assert!(matches!(session.attach().await, Err(CheckerError::NoPageFound)));
    }

    #[tokio::test]
    async fn unreachable_port_means_browser_not_running() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let session = CdpSession::new("127.0.0.1", port).unwrap();
        assert!(!session.is_alive().await);
        assert!(matches!(
            session.get_pages().await,
            Err(CheckerError::BrowserNotRunning(_))
        ));
    }

    #[tokio::test]
    async fn evaluates_page_state_script() {
        let ws_url = cdp_target(serde_json::json!({
            "result": {
                "type": "object",
                "value": {
                    "location": "https://www.bilibili.com/video/BV1HP411D7Rj?p=3",
                    "injected": { "initialState": { "bvid": "BV1HP411D7Rj", "p": 3 }, "vd": null }
                }
            }
        }))
        .await;
        let mut target = page("T1", "https://www.bilibili.com/video/BV1HP411D7Rj?p=3");
        target.web_socket_debugger_url = Some(ws_url);
        let session = CdpSession::new("127.0.0.1", 1).unwrap();

        let value = session.eval_on_page(&target, PAGE_STATE_SCRIPT).await.unwrap();
        let snapshot: PageSnapshot = serde_json::from_value(value).unwrap();

        assert_eq!(snapshot.location, "https://www.bilibili.com/video/BV1HP411D7Rj?p=3");
        assert_eq!(snapshot.injected["initialState"]["p"], 3);
    }

    #[tokio::test]
    async fn thrown_exception_is_a_javascript_error() {
        let ws_url = cdp_target(serde_json::json!({
            "result": { "type": "object", "subtype": "error" },
            "exceptionDetails": { "text": "Uncaught ReferenceError" }
        }))
        .await;
        let mut target = page("T1", "https://www.bilibili.com/");
        target.web_socket_debugger_url = Some(ws_url);
        let session = CdpSession::new("127.0.0.1", 1).unwrap();

        assert!(matches!(
            session.eval_on_page(&target, "nope()").await,
            Err(CheckerError::JavaScriptError(_))
        ));
    }
}
