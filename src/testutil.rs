//! MessagePack builders shared by the unit tests.

use rmp::encode;

#[derive(Debug, Clone)]
pub enum Mp {
    Nil,
    Bool(bool),
    Uint(u64),
    Int(i64),
    Str(String),
    Arr(Vec<Mp>),
    Map(Vec<(Mp, Mp)>),
}

pub fn s(value: &str) -> Mp {
    Mp::Str(value.to_string())
}

pub fn arr(items: Vec<Mp>) -> Mp {
    Mp::Arr(items)
}

pub fn map(entries: &[(&str, Mp)]) -> Mp {
    Mp::Map(entries.iter().map(|(k, v)| (s(k), v.clone())).collect())
}

impl Mp {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write(&mut buf);
        buf
    }

    fn write(&self, buf: &mut Vec<u8>) {
        match self {
            Mp::Nil => encode::write_nil(buf).unwrap(),
            Mp::Bool(b) => encode::write_bool(buf, *b).unwrap(),
            Mp::Uint(n) => {
                encode::write_uint(buf, *n).unwrap();
            }
            Mp::Int(n) => {
                encode::write_sint(buf, *n).unwrap();
            }
            Mp::Str(v) => encode::write_str(buf, v).unwrap(),
            Mp::Arr(items) => {
                encode::write_array_len(buf, items.len() as u32).unwrap();
                for item in items {
                    item.write(buf);
                }
            }
            Mp::Map(entries) => {
                encode::write_map_len(buf, entries.len() as u32).unwrap();
                for (k, v) in entries {
                    k.write(buf);
                    v.write(buf);
                }
            }
        }
    }
}
