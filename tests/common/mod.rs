// In-process coordinator stand-in speaking the bundled frame format.
#![allow(dead_code)]
use std::collections::VecDeque;
use std::io::BufReader;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use std::thread;

use coordlink::core::config::{Configuration, Dimension, Region, ServerEntry, Space, Subspace};
use coordlink::core::link::GET_CONFIG;
use coordlink::core::status::TransportStatus;
use coordlink::transport::wire::{
    RequestFrame, decode_request, encode_response, read_frame, write_frame,
};

pub enum Reply {
    Respond(TransportStatus, Vec<u8>),
    Hold,
}

pub struct FakeCoordinator {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RequestFrame>>>,
}

impl FakeCoordinator {
    /// Serve connections one at a time; `handler` decides each reply.
    pub fn start<F>(handler: F) -> Self
    where
        F: FnMut(&RequestFrame) -> Reply + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        let mut handler = handler;

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let Ok(mut writer) = stream.try_clone() else {
                    continue;
                };
                let mut reader = BufReader::new(stream);
                while let Ok(Some(body)) = read_frame(&mut reader) {
                    let Ok(request) = decode_request(&body) else {
                        break;
                    };
                    let reply = handler(&request);
                    let id = request.id;
                    log.lock().expect("log").push(request);
                    if let Reply::Respond(status, output) = reply {
                        let frame = encode_response(id, status, &output).expect("encode");
                        if write_frame(&mut writer, &frame).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self { addr, requests }
    }

    /// Answer get-config from `configs` in order, then hold; other functions go to `rpc`.
    pub fn scripted<F>(configs: Vec<Vec<u8>>, mut rpc: F) -> Self
    where
        F: FnMut(&RequestFrame) -> Reply + Send + 'static,
    {
        let mut queue: VecDeque<Vec<u8>> = configs.into();
        Self::start(move |request| {
            if request.function == GET_CONFIG {
                match queue.pop_front() {
                    Some(bytes) => Reply::Respond(TransportStatus::Success, bytes),
                    None => Reply::Hold,
                }
            } else {
                rpc(request)
            }
        })
    }

    pub fn addr(&self) -> String {
        self.addr.to_string()
    }

    pub fn requests(&self) -> Vec<RequestFrame> {
        self.requests.lock().expect("log").clone()
    }

    pub fn count(&self, function: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.function == function)
            .count()
    }
}

pub fn no_rpc(_: &RequestFrame) -> Reply {
    Reply::Respond(TransportStatus::FuncNotFound, Vec::new())
}

pub fn echo_rpc(request: &RequestFrame) -> Reply {
    if request.function == "echo" {
        Reply::Respond(TransportStatus::Success, request.input.clone())
    } else {
        Reply::Respond(TransportStatus::FuncNotFound, Vec::new())
    }
}

pub fn cluster_config(version: u64) -> Configuration {
    Configuration {
        cluster: 0xc1,
        version,
        flags: 0,
        servers: vec![
            ServerEntry {
                id: 1,
                address: "10.0.0.1:2012".to_string(),
            },
            ServerEntry {
                id: 2,
                address: "10.0.0.2:2012".to_string(),
            },
        ],
        spaces: vec![Space {
            id: 1,
            name: "kv".to_string(),
            dimensions: vec![
                Dimension {
                    name: "k".to_string(),
                    datatype: 9,
                },
                Dimension {
                    name: "v".to_string(),
                    datatype: 9,
                },
            ],
            subspaces: vec![Subspace {
                id: 1,
                attrs: vec![0],
                regions: vec![Region {
                    id: 1,
                    prefix: 0,
                    mask: 0,
                    replicas: vec![1, 2],
                }],
            }],
        }],
    }
}

pub fn config_bytes(version: u64) -> Vec<u8> {
    cluster_config(version).encode().expect("encode")
}
