//! In-memory key/value backend
//!
//! Lets the console run without a server. Understands a small set of
//! string and list commands and replies in redis-cli style.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::core::{Backend, ResponseEvent};

enum Value {
    Str(String),
    List(VecDeque<String>),
}

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Default)]
pub struct MemoryBackend {
    data: HashMap<String, Value>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn list_mut(&mut self, key: &str) -> Result<&mut VecDeque<String>, ResponseEvent> {
        match self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Value::List(VecDeque::new()))
        {
            Value::List(list) => Ok(list),
            Value::Str(_) => Err(ResponseEvent::error(WRONGTYPE)),
        }
    }

    fn dispatch(&mut self, name: &str, args: &[String]) -> ResponseEvent {
        match (name, args.len()) {
            ("PING", 0) => ResponseEvent::result("PONG"),
            ("PING", 1) | ("ECHO", 1) => ResponseEvent::result(quoted(&args[0])),
            ("SET", 2) => {
                self.data
                    .insert(args[0].clone(), Value::Str(args[1].clone()));
                ResponseEvent::result("OK")
            }
            ("GET", 1) => match self.data.get(&args[0]) {
                Some(Value::Str(s)) => ResponseEvent::result(quoted(s)),
                Some(Value::List(_)) => ResponseEvent::error(WRONGTYPE),
                None => ResponseEvent::result("(nil)"),
            },
            ("DEL", n) if n > 0 => {
                let removed = args.iter().filter(|k| self.data.remove(*k).is_some()).count();
                integer(removed)
            }
            ("EXISTS", n) if n > 0 => {
                integer(args.iter().filter(|k| self.data.contains_key(*k)).count())
            }
            ("LPUSH", n) | ("RPUSH", n) if n > 1 => {
                let front = name == "LPUSH";
                match self.list_mut(&args[0]) {
                    Ok(list) => {
                        for element in &args[1..] {
                            if front {
                                list.push_front(element.clone());
                            } else {
                                list.push_back(element.clone());
                            }
                        }
                        integer(list.len())
                    }
                    Err(e) => e,
                }
            }
            ("LLEN", 1) => match self.data.get(&args[0]) {
                Some(Value::List(list)) => integer(list.len()),
                Some(Value::Str(_)) => ResponseEvent::error(WRONGTYPE),
                None => integer(0),
            },
            ("LRANGE", 3) => self.lrange(&args[0], &args[1], &args[2]),
            ("KEYS", 1) => {
                let mut keys: Vec<&String> = self
                    .data
                    .keys()
                    .filter(|k| glob_match(&args[0], k))
                    .collect();
                keys.sort();
                array(keys.into_iter())
            }
            ("FLUSHALL", 0) => {
                self.data.clear();
                ResponseEvent::result("OK")
            }
            ("PING", _) | ("ECHO", _) | ("SET", _) | ("GET", _) | ("DEL", _) | ("EXISTS", _)
            | ("LPUSH", _) | ("RPUSH", _) | ("LLEN", _) | ("LRANGE", _) | ("KEYS", _)
            | ("FLUSHALL", _) => ResponseEvent::error(format!(
                "ERR wrong number of arguments for '{}' command",
                name.to_lowercase()
            )),
            _ => ResponseEvent::error(format!("ERR unknown command '{}'", name.to_lowercase())),
        }
    }

    fn lrange(&self, key: &str, start: &str, stop: &str) -> ResponseEvent {
        let (Ok(start), Ok(stop)) = (start.parse::<i64>(), stop.parse::<i64>()) else {
            return ResponseEvent::error("ERR value is not an integer or out of range");
        };
        let list = match self.data.get(key) {
            Some(Value::List(list)) => list,
            Some(Value::Str(_)) => return ResponseEvent::error(WRONGTYPE),
            None => return array(std::iter::empty::<&String>()),
        };

        let len = list.len() as i64;
        let norm = |i: i64| if i < 0 { (len + i).max(0) } else { i };
        let (start, stop) = (norm(start), norm(stop).min(len - 1));
        if start > stop {
            return array(std::iter::empty::<&String>());
        }
        array(list.iter().skip(start as usize).take((stop - start + 1) as usize))
    }
}

impl Backend for MemoryBackend {
    fn execute(&mut self, command: &str) -> ResponseEvent {
        let words = split_args(command);
        let Some((name, args)) = words.split_first() else {
            return ResponseEvent::error("ERR empty command");
        };
        debug!("backend executing {}", name);
        self.dispatch(&name.to_ascii_uppercase(), args)
    }
}

/// Split on whitespace, keeping double-quoted runs together
fn split_args(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_word = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_word = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_word {
                    words.push(std::mem::take(&mut current));
                    has_word = false;
                }
            }
            c => {
                current.push(c);
                has_word = true;
            }
        }
    }
    if has_word {
        words.push(current);
    }
    words
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", s)
}

fn integer(n: usize) -> ResponseEvent {
    ResponseEvent::result(format!("(integer) {}", n))
}

fn array<'a>(items: impl Iterator<Item = &'a String>) -> ResponseEvent {
    let lines: Vec<String> = items
        .enumerate()
        .map(|(i, item)| format!("{}) {}", i + 1, quoted(item)))
        .collect();
    if lines.is_empty() {
        ResponseEvent::result("(empty array)")
    } else {
        ResponseEvent::result(lines.join("\n"))
    }
}

/// `*` and `?` wildcards only
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}
