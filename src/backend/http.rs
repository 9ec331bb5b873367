//! HTTP transport
//!
//! Each request runs on its own short-lived thread with a blocking `ureq`
//! agent; replies come back over an mpsc channel that the UI thread drains
//! once per frame.

use super::{
    parse_document_reply, parse_fetched_document, parse_footprint_reply, parse_mesh_reply, parse_trace_reply, Reply,
    Request, Transport,
};
use log::{debug, warn};
use serde_json::{json, Value};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::{Duration, Instant};

pub struct HttpTransport {
    base_url: String,
    agent: ureq::Agent,
    sender: Sender<Reply>,
    receiver: Receiver<Reply>,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        let (sender, receiver) = channel();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
            sender,
            receiver,
        }
    }

    /// Run a request on the calling thread
    pub fn execute(&self, request: Request) -> Reply {
        execute(&self.agent, &self.base_url, request)
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: Request) {
        let agent = self.agent.clone();
        let base_url = self.base_url.clone();
        let sender = self.sender.clone();
        std::thread::spawn(move || {
            let reply = execute(&agent, &base_url, request);
            if sender.send(reply).is_err() {
                debug!("Reply dropped, transport is gone");
            }
        });
    }

    fn poll(&self) -> Vec<Reply> {
        self.receiver.try_iter().collect()
    }
}

fn read_body(response: Result<ureq::Response, ureq::Error>, url: &str) -> Result<String, String> {
    response
        .map_err(|e| format!("Request to {} failed: {}", url, e))?
        .into_string()
        .map_err(|e| format!("Failed to read reply from {}: {}", url, e))
}

fn post(agent: &ureq::Agent, url: &str, body: &Value) -> Result<String, String> {
    read_body(agent.post(url).send_json(body), url)
}

fn get(agent: &ureq::Agent, url: &str, query: &[(&str, &str)]) -> Result<String, String> {
    let request = query
        .iter()
        .fold(agent.get(url), |request, (name, value)| request.query(name, value));
    read_body(request.call(), url)
}

fn execute(agent: &ureq::Agent, base_url: &str, request: Request) -> Reply {
    let started = Instant::now();
    let url = |endpoint: &str| format!("{}/{}", base_url, endpoint);

    let reply = match request {
        Request::Document { revision, document } => Reply::Document {
            revision,
            result: post(agent, &url("system"), &document).and_then(|text| parse_document_reply(&text)),
        },
        Request::FetchDocument => {
            Reply::FetchedDocument(get(agent, &url("system"), &[]).and_then(|text| parse_fetched_document(&text)))
        }
        Request::Mesh { key, spec } => Reply::Mesh {
            key,
            result: post(agent, &url("mesh"), &json!({ "spec": spec })).and_then(|text| parse_mesh_reply(&text)),
        },
        Request::Trace { revision, rays } => {
            let rays = rays.to_string();
            Reply::Trace {
                revision,
                result: get(agent, &url("trace"), &[("n", rays.as_str())]).and_then(|text| parse_trace_reply(&text)),
            }
        }
        Request::Footprint { path } => {
            let element = path.to_string();
            Reply::Footprint {
                result: get(agent, &url("footprint"), &[("element", element.as_str())])
                    .and_then(|text| parse_footprint_reply(&text)),
                path,
            }
        }
    };

    match &reply {
        Reply::Document { result: Err(e), .. }
        | Reply::FetchedDocument(Err(e))
        | Reply::Mesh { result: Err(e), .. }
        | Reply::Trace { result: Err(e), .. }
        | Reply::Footprint { result: Err(e), .. } => warn!("{}", e),
        _ => debug!("Request finished in {} ms", started.elapsed().as_millis()),
    }
    reply
}
