//! Purpose: Versioned snapshot of cluster configuration and its binary form.
//! Exports: `Configuration`, `ServerEntry`, `Space`, `Dimension`, `Subspace`, `Region`.
//! Role: Value type the coordinator link caches; produced by decoding a get-config reply.
//! Invariants: `decode` succeeds only when the whole buffer is consumed exactly.
//! Invariants: `Configuration::default()` is the empty config at version 0.
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::core::codec::{DecodeError, EncodeError, Packer, Unpacker};

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Configuration {
    pub cluster: u64,
    pub version: u64,
    pub flags: u64,
    pub servers: Vec<ServerEntry>,
    pub spaces: Vec<Space>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ServerEntry {
    pub id: u64,
    pub address: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Space {
    pub id: u64,
    pub name: String,
    pub dimensions: Vec<Dimension>,
    pub subspaces: Vec<Subspace>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Dimension {
    pub name: String,
    pub datatype: u16,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Subspace {
    pub id: u64,
    /// Indices into the owning space's `dimensions`.
    pub attrs: Vec<u16>,
    pub regions: Vec<Region>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Region {
    pub id: u64,
    pub prefix: u8,
    pub mask: u64,
    pub replicas: Vec<u64>,
}

impl Configuration {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn space(&self, name: &str) -> Option<&Space> {
        self.spaces.iter().find(|space| space.name == name)
    }

    pub fn server_address(&self, id: u64) -> Option<&str> {
        self.servers
            .iter()
            .find(|server| server.id == id)
            .map(|server| server.address.as_str())
    }

    /// Hex SHA-256 of the encoded form; equal configs share a fingerprint.
    pub fn fingerprint(&self) -> Result<String, EncodeError> {
        let digest = Sha256::digest(self.encode()?);
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            use std::fmt::Write;
            let _ = write!(hex, "{byte:02x}");
        }
        Ok(hex)
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut p = Packer::new();
        p.u64(self.cluster).u64(self.version).u64(self.flags);
        p.count(self.servers.len());
        for server in &self.servers {
            p.u64(server.id).str(&server.address);
        }
        p.count(self.spaces.len());
        for space in &self.spaces {
            p.u64(space.id).str(&space.name);
            p.count(space.dimensions.len());
            for dim in &space.dimensions {
                p.str(&dim.name).u16(dim.datatype);
            }
            p.count(space.subspaces.len());
            for subspace in &space.subspaces {
                p.u64(subspace.id);
                p.count(subspace.attrs.len());
                for attr in &subspace.attrs {
                    p.u16(*attr);
                }
                p.count(subspace.regions.len());
                for region in &subspace.regions {
                    p.u64(region.id).u8(region.prefix).u64(region.mask);
                    p.count(region.replicas.len());
                    for replica in &region.replicas {
                        p.u64(*replica);
                    }
                }
            }
        }
        p.finish()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut up = Unpacker::new(buf);
        let cluster = up.u64()?;
        let version = up.u64()?;
        let flags = up.u64()?;

        let server_count = up.seq_len(12)?;
        let mut servers = Vec::with_capacity(server_count);
        for _ in 0..server_count {
            let id = up.u64()?;
            let address = up.str()?.to_string();
            servers.push(ServerEntry { id, address });
        }

        let space_count = up.seq_len(20)?;
        let mut spaces = Vec::with_capacity(space_count);
        for _ in 0..space_count {
            spaces.push(decode_space(&mut up)?);
        }

        up.finish()?;
        Ok(Self {
            cluster,
            version,
            flags,
            servers,
            spaces,
        })
    }
}

fn decode_space(up: &mut Unpacker<'_>) -> Result<Space, DecodeError> {
    let id = up.u64()?;
    let name = up.str()?.to_string();

    let dim_count = up.seq_len(6)?;
    let mut dimensions = Vec::with_capacity(dim_count);
    for _ in 0..dim_count {
        let name = up.str()?.to_string();
        let datatype = up.u16()?;
        dimensions.push(Dimension { name, datatype });
    }

    let subspace_count = up.seq_len(16)?;
    let mut subspaces = Vec::with_capacity(subspace_count);
    for _ in 0..subspace_count {
        let id = up.u64()?;
        let attr_count = up.seq_len(2)?;
        let mut attrs = Vec::with_capacity(attr_count);
        for _ in 0..attr_count {
            let attr = up.u16()?;
            if attr as usize >= dimensions.len() {
                return Err(DecodeError::Invalid("subspace attribute index"));
            }
            attrs.push(attr);
        }
        let region_count = up.seq_len(21)?;
        let mut regions = Vec::with_capacity(region_count);
        for _ in 0..region_count {
            let id = up.u64()?;
            let prefix = up.u8()?;
            if prefix > 64 {
                return Err(DecodeError::Invalid("region prefix"));
            }
            let mask = up.u64()?;
            let replica_count = up.seq_len(8)?;
            let mut replicas = Vec::with_capacity(replica_count);
            for _ in 0..replica_count {
                replicas.push(up.u64()?);
            }
            regions.push(Region {
                id,
                prefix,
                mask,
                replicas,
            });
        }
        subspaces.push(Subspace { id, attrs, regions });
    }

    Ok(Space {
        id,
        name,
        dimensions,
        subspaces,
    })
}

#[cfg(test)]
pub(crate) fn sample(version: u64) -> Configuration {
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
            id: 10,
            name: "kv".to_string(),
            dimensions: vec![
                Dimension {
                    name: "key".to_string(),
                    datatype: 9,
                },
                Dimension {
                    name: "value".to_string(),
                    datatype: 9,
                },
            ],
            subspaces: vec![Subspace {
                id: 11,
                attrs: vec![0],
                regions: vec![Region {
                    id: 12,
                    prefix: 0,
                    mask: 0,
                    replicas: vec![1, 2],
                }],
            }],
        }],
    }
}
