//! Playwright browser automation
//!
//! A [`PlaywrightSession`] owns one long-lived `node` process running a small bridge
//! script. Requests and responses are single JSON lines over stdin/stdout:
//!
//! ```text
//! → {"id":3,"op":"fill","region":1,"text":"qzxy"}
//! ← {"id":3,"ok":true,"value":null}
//! ← {"id":4,"ok":false,"kind":"not_found","error":"..."}
//! ```

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tracing::{debug, info, warn};

use crate::automation::{Automation, RegionId, RegionQuery, RegionSnapshot};
use crate::config::{Browser, HarnessConfig};
use crate::error::{HarnessError, HarnessResult};

/// Upper bound for any single bridge request besides region resolution
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Node.js side of the bridge
pub const BRIDGE_SCRIPT: &str = r##"
const path = require('path');
const readline = require('readline');
// The script is staged in a temp dir; resolve packages from the working directory instead
const requireFromCwd = require('module').createRequire(path.join(process.cwd(), 'bridge.js'));

let playwright;
try {
  playwright = requireFromCwd('playwright');
} catch (_) {
  try {
    playwright = requireFromCwd('@playwright/test');
  } catch (e) {
    process.stdout.write(JSON.stringify({ id: 0, ok: false, kind: 'error',
      error: 'playwright module not found (npm install playwright)' }) + '\n');
    process.exit(1);
  }
}

class NotFound extends Error {}

const SNAPSHOT = el => {
  const editable = el.tagName === 'TEXTAREA' || el.tagName === 'INPUT'
    || el.getAttribute('role') === 'textbox' || el.isContentEditable;
  const text = editable && 'value' in el ? el.value : (el.textContent || '');
  return { text, editable };
};

let browser = null;
let page = null;
const regions = new Map();
let nextRegion = 1;

function reply(id, value) {
  process.stdout.write(JSON.stringify({ id, ok: true, value: value === undefined ? null : value }) + '\n');
}

function fail(id, err) {
  process.stdout.write(JSON.stringify({
    id, ok: false,
    kind: err instanceof NotFound ? 'not_found' : 'error',
    error: String((err && err.message) || err),
  }) + '\n');
}

function region(id) {
  const loc = regions.get(id);
  if (!loc) throw new NotFound(`unknown region ${id}`);
  return loc;
}

async function resolve(query, timeoutMs) {
  let locator = null;
  if (query.by === 'label') {
    locator = page.getByRole(query.role, { name: query.name }).first();
    try {
      await locator.waitFor({ state: 'attached', timeout: timeoutMs });
    } catch (_) {
      throw new NotFound(`${query.role} "${query.name}" not found`);
    }
  } else {
    let all = page.locator(query.css);
    if (query.exclude_editable) {
      all = all.filter({ hasNot: page.locator('textarea') });
    }
    const deadline = Date.now() + timeoutMs;
    while (!locator) {
      const count = await all.count();
      for (let i = 0; i < count; i++) {
        const candidate = all.nth(i);
        if (!query.exclude_editable || !(await candidate.evaluate(SNAPSHOT)).editable) {
          locator = candidate;
          break;
        }
      }
      if (locator) break;
      if (Date.now() >= deadline) {
        throw new NotFound(`no ${query.exclude_editable ? 'non-editable ' : ''}match for ${query.css}`);
      }
      await page.waitForTimeout(100);
    }
  }
  const id = nextRegion++;
  regions.set(id, locator);
  return id;
}

async function handle(req) {
  switch (req.op) {
    case 'launch': {
      browser = await playwright[req.browser].launch({ headless: req.headless });
      const context = await browser.newContext();
      page = await context.newPage();
      return null;
    }
    case 'navigate':
      regions.clear();
      await page.goto(req.url);
      await page.waitForLoadState('networkidle');
      return null;
    case 'resolve':
      return await resolve(req.query, req.timeout_ms);
    case 'read':
      return await region(req.region).evaluate(SNAPSHOT);
    case 'fill':
      await region(req.region).fill(req.text);
      return null;
    case 'type':
      await region(req.region).pressSequentially(req.text, { delay: req.delay_ms });
      return null;
    case 'close':
      if (browser) await browser.close();
      browser = null;
      return null;
    default:
      throw new Error(`unknown op ${req.op}`);
  }
}

const rl = readline.createInterface({ input: process.stdin });
let chain = Promise.resolve();
rl.on('line', line => {
  chain = chain.then(async () => {
    let req;
    try {
      req = JSON.parse(line);
    } catch (e) {
      return fail(0, e);
    }
    try {
      reply(req.id, await handle(req));
    } catch (e) {
      fail(req.id, e);
    }
    if (req.op === 'close') process.exit(0);
  });
});
rl.on('close', () => {
  chain.then(async () => {
    if (browser) await browser.close();
    process.exit(0);
  });
});
"##;

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeRequest<'a> {
    Launch { browser: &'a str, headless: bool },
    Navigate { url: &'a str },
    Resolve { query: &'a RegionQuery, timeout_ms: u64 },
    Read { region: RegionId },
    Fill { region: RegionId, text: &'a str },
    Type { region: RegionId, text: &'a str, delay_ms: u64 },
    Close,
}

impl BridgeRequest<'_> {
    fn name(&self) -> &'static str {
        match self {
            BridgeRequest::Launch { .. } => "launch",
            BridgeRequest::Navigate { .. } => "navigate",
            BridgeRequest::Resolve { .. } => "resolve",
            BridgeRequest::Read { .. } => "read",
            BridgeRequest::Fill { .. } => "fill",
            BridgeRequest::Type { .. } => "type",
            BridgeRequest::Close => "close",
        }
    }
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    request: BridgeRequest<'a>,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl BridgeResponse {
    /// Turn a response into the value or the matching harness error
    fn into_result(self, request: &str, waited: Duration) -> HarnessResult<serde_json::Value> {
        if self.ok {
            return Ok(self.value);
        }
        let message = self.error.unwrap_or_else(|| "unknown bridge error".to_string());
        match self.kind.as_deref() {
            Some("not_found") => Err(HarnessError::target_unavailable(message, waited)),
            _ => Err(HarnessError::Automation(format!("{} failed: {}", request, message))),
        }
    }
}

/// Playwright browser session
pub struct PlaywrightSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    closed: bool,

    /// Holds the staged bridge script for the life of the process
    _script_dir: tempfile::TempDir,
}

impl PlaywrightSession {
    /// Start the bridge and launch a browser
    pub async fn launch(config: &HarnessConfig) -> HarnessResult<Self> {
        Self::check_node_installed(&config.node_binary)?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .current_dir(std::env::current_dir()?)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| HarnessError::Automation("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HarnessError::Automation("bridge stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("[bridge] {}", line);
                }
            });
        }

        let mut session = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            closed: false,
            _script_dir: script_dir,
        };

        info!(
            "Launching {} ({})",
            config.browser.as_str(),
            if config.headless { "headless" } else { "headed" }
        );
        session.launch_browser(config.browser, config.headless).await?;

        Ok(session)
    }

    /// Check that the Node.js executable runs
    fn check_node_installed(node: &Path) -> HarnessResult<()> {
        let status = Command::new(node)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(HarnessError::BridgeNotFound(node.display().to_string())),
        }
    }

    async fn launch_browser(&mut self, browser: Browser, headless: bool) -> HarnessResult<()> {
        self.request(
            BridgeRequest::Launch {
                browser: browser.as_str(),
                headless,
            },
            REQUEST_TIMEOUT,
        )
        .await?;
        Ok(())
    }

    async fn request(
        &mut self,
        request: BridgeRequest<'_>,
        timeout: Duration,
    ) -> HarnessResult<serde_json::Value> {
        if self.closed {
            return Err(HarnessError::Automation("session closed".to_string()));
        }

        let id = self.next_id;
        self.next_id += 1;
        let name = request.name();

        let mut line = serde_json::to_string(&Envelope { id, request })?;
        line.push('\n');
        debug!("bridge → {}", line.trim_end());

        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        let response = tokio::time::timeout(timeout, self.read_response(id))
            .await
            .map_err(|_| {
                HarnessError::Automation(format!("{} timed out after {:?}", name, timeout))
            })??;

        response.into_result(name, timeout)
    }

    async fn read_response(&mut self, id: u64) -> HarnessResult<BridgeResponse> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| HarnessError::Automation("bridge exited".to_string()))?;
            debug!("bridge ← {}", line);

            match serde_json::from_str::<BridgeResponse>(&line) {
                // id 0 carries bridge-level failures (startup, unparseable request)
                Ok(response) if response.id == id || response.id == 0 => return Ok(response),
                Ok(response) => warn!("ignoring stale bridge response {}", response.id),
                Err(_) => debug!("ignoring non-protocol bridge output"),
            }
        }
    }

    /// Best-effort shutdown: SIGTERM first, then kill
    fn terminate(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }
        let _ = self.child.start_kill();
    }
}

#[async_trait]
impl Automation for PlaywrightSession {
    async fn navigate(&mut self, url: &str) -> HarnessResult<()> {
        self.request(BridgeRequest::Navigate { url }, REQUEST_TIMEOUT).await?;
        Ok(())
    }

    async fn resolve(&mut self, query: &RegionQuery, timeout: Duration) -> HarnessResult<RegionId> {
        let value = self
            .request(
                BridgeRequest::Resolve {
                    query,
                    timeout_ms: timeout.as_millis() as u64,
                },
                timeout + REQUEST_TIMEOUT,
            )
            .await
            .map_err(|e| match e {
                HarnessError::TargetUnavailable { .. } => {
                    HarnessError::target_unavailable(query.describe(), timeout)
                }
                other => other,
            })?;
        Ok(serde_json::from_value(value)?)
    }

    async fn read(&mut self, region: RegionId) -> HarnessResult<RegionSnapshot> {
        let value = self.request(BridgeRequest::Read { region }, REQUEST_TIMEOUT).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn fill(&mut self, region: RegionId, text: &str) -> HarnessResult<()> {
        self.request(BridgeRequest::Fill { region, text }, REQUEST_TIMEOUT).await?;
        Ok(())
    }

    async fn type_text(
        &mut self,
        region: RegionId,
        text: &str,
        key_delay: Duration,
    ) -> HarnessResult<()> {
        let typing = key_delay * text.chars().count() as u32;
        self.request(
            BridgeRequest::Type {
                region,
                text,
                delay_ms: key_delay.as_millis() as u64,
            },
            typing + REQUEST_TIMEOUT,
        )
        .await?;
        Ok(())
    }

    async fn close(&mut self) -> HarnessResult<()> {
        if self.closed {
            return Ok(());
        }

        let result = self.request(BridgeRequest::Close, REQUEST_TIMEOUT).await;
        self.closed = true;

        match tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(_) => {}
            Err(_) => self.terminate(),
        }

        result.map(|_| ())
    }
}

impl Drop for PlaywrightSession {
    fn drop(&mut self) {
        if !self.closed {
            self.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope_is_flat() {
        let query = RegionQuery::Label {
            role: "textbox".to_string(),
            name: "Input Your Singlish Text Here.".to_string(),
        };
        let json = serde_json::to_value(Envelope {
            id: 7,
            request: BridgeRequest::Resolve {
                query: &query,
                timeout_ms: 5000,
            },
        })
        .unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["op"], "resolve");
        assert_eq!(json["timeout_ms"], 5000);
        assert_eq!(json["query"]["by"], "label");
        assert_eq!(json["query"]["name"], "Input Your Singlish Text Here.");
    }

    #[test]
    fn test_type_request_keeps_text_exact() {
        let json = serde_json::to_string(&Envelope {
            id: 2,
            request: BridgeRequest::Type {
                region: RegionId(1),
                text: "Line 1.\nLine  2.",
                delay_ms: 150,
            },
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"id":2,"op":"type","region":1,"text":"Line 1.\nLine  2.","delay_ms":150}"#
        );
    }

    #[test]
    fn test_not_found_maps_to_target_unavailable() {
        let response: BridgeResponse = serde_json::from_str(
            r#"{"id":4,"ok":false,"kind":"not_found","error":"textbox not found"}"#,
        )
        .unwrap();
        let err = response.into_result("resolve", Duration::from_millis(5000)).unwrap_err();
        assert!(matches!(err, HarnessError::TargetUnavailable { waited_ms: 5000, .. }));
    }

    #[test]
    fn test_other_failures_are_automation_errors() {
        let line = r#"{"id":5,"ok":false,"kind":"error","error":"Target closed"}"#;
        let response: BridgeResponse = serde_json::from_str(line).unwrap();
        match response.into_result("fill", REQUEST_TIMEOUT).unwrap_err() {
            HarnessError::Automation(msg) => assert_eq!(msg, "fill failed: Target closed"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_read_value_decodes_snapshot() {
        let response: BridgeResponse = serde_json::from_str(
            r#"{"id":9,"ok":true,"value":{"text":"  ගෙදරාආආ\n","editable":false}}"#,
        )
        .unwrap();
        let value = response.into_result("read", REQUEST_TIMEOUT).unwrap();
        let snapshot: RegionSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(snapshot.text, "  ගෙදරාආආ\n");
        assert!(!snapshot.editable);
    }

    #[test]
    fn test_bridge_script_handles_every_op() {
        for op in ["launch", "navigate", "resolve", "read", "fill", "type", "close"] {
            assert!(BRIDGE_SCRIPT.contains(&format!("case '{}'", op)), "missing op {}", op);
        }
    }
}
