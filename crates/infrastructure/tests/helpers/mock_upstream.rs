#![allow(dead_code)]
use async_trait::async_trait;
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{RData, Record};
use splitroute_domain::DomainError;
use splitroute_infrastructure::dns::{ConnectOptions, MessageBuilder, Upstream};
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// What one `connect` call does.
#[derive(Clone, Debug)]
pub enum Step {
    Reply,
    ReplyTruncated,
    ReplyWithWrongId,
    /// A reply with `n` A records.
    ReplyLarge(usize),
    CachedClosed,
    Refused,
    /// Fails with the given error.
    Fail(DomainError),
    Hang(Duration),
}

/// A scriptable upstream. Steps are consumed in order, then `fallback`
/// repeats.
pub struct MockUpstream {
    addr: String,
    down: AtomicBool,
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    connects: AtomicUsize,
    healthchecks: AtomicUsize,
    started: AtomicBool,
    seen: Mutex<Vec<(Message, ConnectOptions)>>,
}

impl MockUpstream {
    pub fn new(addr: &str, fallback: Step) -> Self {
        Self {
            addr: addr.to_string(),
            down: AtomicBool::new(false),
            script: Mutex::new(VecDeque::new()),
            fallback,
            connects: AtomicUsize::new(0),
            healthchecks: AtomicUsize::new(0),
            started: AtomicBool::new(false),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn healthy(addr: &str) -> Self {
        Self::new(addr, Step::Reply)
    }

    pub fn with_script(self, steps: Vec<Step>) -> Self {
        *self.script.lock().unwrap() = steps.into();
        self
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn healthchecks(&self) -> usize {
        self.healthchecks.load(Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn seen_options(&self) -> Vec<ConnectOptions> {
        self.seen.lock().unwrap().iter().map(|(_, o)| *o).collect()
    }

    pub fn last_query(&self) -> Option<Message> {
        self.seen.lock().unwrap().last().map(|(q, _)| q.clone())
    }

    fn next_step(&self) -> Step {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

pub fn reply_to(query: &Message, answers: usize) -> Message {
    let mut reply = MessageBuilder::error_response(query, ResponseCode::NoError);
    reply.set_recursion_available(true);
    if let Some(question) = query.queries().first() {
        for i in 0..answers {
            reply.add_answer(Record::from_rdata(
                question.name().clone(),
                60,
                RData::A(A(Ipv4Addr::new(10, 0, (i / 256) as u8, (i % 256) as u8))),
            ));
        }
    }
    reply
}

#[async_trait]
impl Upstream for MockUpstream {
    fn addr(&self) -> &str {
        &self.addr
    }

    fn down(&self, max_fails: u32) -> bool {
        max_fails != 0 && self.down.load(Ordering::SeqCst)
    }

    async fn connect(&self, query: &Message, opts: ConnectOptions) -> Result<Message, DomainError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((query.clone(), opts));

        match self.next_step() {
            Step::Reply => Ok(reply_to(query, 1)),
            Step::ReplyTruncated => {
                let mut reply = reply_to(query, 0);
                reply.set_truncated(true);
                Ok(reply)
            }
            Step::ReplyWithWrongId => {
                let mut reply = reply_to(query, 1);
                reply.set_id(query.id().wrapping_add(1));
                Ok(reply)
            }
            Step::ReplyLarge(n) => Ok(reply_to(query, n)),
            Step::CachedClosed => Err(DomainError::CachedConnectionClosed),
            Step::Refused => {
                tokio::task::yield_now().await;
                Err(DomainError::TransportConnectionRefused {
                    server: self.addr.clone(),
                })
            }
            Step::Fail(err) => Err(err),
            Step::Hang(duration) => {
                tokio::time::sleep(duration).await;
                Ok(reply_to(query, 1))
            }
        }
    }

    fn healthcheck(&self) {
        self.healthchecks.fetch_add(1, Ordering::SeqCst);
    }

    fn start(&self, _interval: Duration) {
        self.started.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
    }
}
