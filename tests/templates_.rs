#![allow(dead_code)]

use futures::FutureExt as _;
use keyhole::{ComposeResult, Composer, Handler, Message, Transport, TransportError};
use parking_lot::Mutex;
use std::{
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::Duration,
};
use tokio::sync::Notify;

pub fn init_logging() {
	//TODO: Fail on warnings and errors where a test doesn't expect them.
	let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::TRACE).try_init();
}

/// Keeps every message it is handed. Can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
	sent: Arc<Mutex<Vec<Message>>>,
	failing: Arc<AtomicBool>,
}

impl RecordingTransport {
	pub fn sent(&self) -> Vec<Message> {
		self.sent.lock().clone()
	}

	pub fn writes(&self) -> usize {
		self.sent.lock().len()
	}

	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}
}

impl Transport for RecordingTransport {
	fn send(&mut self, message: Message) -> Result<(), TransportError> {
		if self.failing.load(Ordering::SeqCst) {
			return Err(TransportError::Closed);
		}
		self.sent.lock().push(message);
		Ok(())
	}
}

/// `<button kh-onclick="0">Clicks: {n}</button>`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counter {
	pub clicks: u32,
}

pub fn counter(state: &Counter, c: &mut Composer<'_, Counter>) -> ComposeResult {
	c.enter_scope(3, 2)?;
	c.append_literal("<button")?;
	c.append_event_binding(
		"click",
		Handler::new(|counter: &mut Counter| {
			counter.clicks += 1;
			Ok(())
		}),
	)?;
	c.append_literal(">Clicks: ")?;
	c.append_scalar(state.clicks, None)?;
	c.append_literal("</button>")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
	pub id: &'static str,
	pub label: String,
}

pub fn items(ids: &[&'static str]) -> Vec<Item> {
	ids.iter().map(|&id| Item { id, label: id.to_uppercase() }).collect()
}

/// `<ul>{items: <li>{label}</li>}</ul>`, keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Todos {
	pub items: Vec<Item>,
}

impl Todos {
	pub fn of(ids: &[&'static str]) -> Self {
		Self { items: items(ids) }
	}
}

pub fn todos(state: &Todos, c: &mut Composer<'_, Todos>) -> ComposeResult {
	c.enter_scope(2, 1)?;
	c.append_literal("<ul>")?;
	c.append_list(
		&state.items,
		|item| item.id,
		Some("fade"),
		|c, item| {
			c.enter_scope(2, 1)?;
			c.append_literal("<li>")?;
			c.append_scalar(item.label.clone(), None)?;
			c.append_literal("</li>")
		},
	)?;
	c.append_literal("</ul>")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
	pub name: String,
	pub highlighted: bool,
	pub show_badge: bool,
	pub score: f64,
}

impl Default for Profile {
	fn default() -> Self {
		Self {
			name: "Ada".to_owned(),
			highlighted: false,
			show_badge: false,
			score: 0.5,
		}
	}
}

/// An attribute, a nested element and a conditional section.
pub fn profile(state: &Profile, c: &mut Composer<'_, Profile>) -> ComposeResult {
	c.enter_scope(3, 3)?;
	c.append_literal("<div")?;
	c.append_attribute("class", |c| {
		c.enter_scope(1, 1)?;
		c.append_literal("card ")?;
		c.append_scalar(state.highlighted, Some("highlight|plain"))
	})?;
	c.append_literal(">")?;
	c.append_element(|c| {
		c.enter_scope(3, 2)?;
		c.append_literal("<h1>")?;
		c.append_scalar(state.name.clone(), None)?;
		c.append_literal("</h1><meter>")?;
		c.append_scalar(state.score, Some(".2"))?;
		c.append_literal("</meter>")
	})?;
	c.append_conditional(state.show_badge, Some("pop"), |c| {
		c.enter_scope(1, 0)?;
		c.append_literal("<span>badge</span>")
	})?;
	c.append_literal("</div>")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
	pub id: &'static str,
	pub title: String,
	pub entries: Vec<Item>,
}

/// Lists nested in list items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Board {
	pub groups: Vec<Group>,
}

pub fn board(state: &Board, c: &mut Composer<'_, Board>) -> ComposeResult {
	c.enter_scope(0, 1)?;
	c.append_list(
		&state.groups,
		|group| group.id,
		None,
		|c, group| {
			c.enter_scope(3, 2)?;
			c.append_literal("<section><h2>")?;
			c.append_scalar(group.title.clone(), None)?;
			c.append_literal("</h2>")?;
			c.append_list(
				&group.entries,
				|entry| entry.id,
				Some("slide"),
				|c, entry| {
					c.enter_scope(2, 1)?;
					c.append_literal("<p>")?;
					c.append_scalar(entry.label.clone(), Some("lower"))?;
					c.append_literal("</p>")
				},
			)?;
			c.append_literal("</section>")
		},
	)
}

/// Records which handlers ran, in order.
#[derive(Debug, Clone, Default)]
pub struct Journal {
	pub entries: Vec<String>,
	/// Notified once the never-completing handler has started.
	pub hanging: Arc<Notify>,
}

/// Bindings: `0` slow (async), `1` fast, `2` fails, `3` panics, `4` never completes, `5` records its payload.
pub fn journal(state: &Journal, c: &mut Composer<'_, Journal>) -> ComposeResult {
	c.enter_scope(3, 7)?;
	c.append_literal("<div")?;
	c.append_event_binding(
		"slow",
		Handler::future(|journal: &mut Journal| {
			async move {
				tokio::time::sleep(Duration::from_millis(20)).await;
				journal.entries.push("slow".to_owned());
				Ok(())
			}
			.boxed()
		}),
	)?;
	c.append_event_binding(
		"fast",
		Handler::new(|journal: &mut Journal| {
			journal.entries.push("fast".to_owned());
			Ok(())
		}),
	)?;
	c.append_event_binding(
		"fail",
		Handler::new(|journal: &mut Journal| {
			journal.entries.push("fail".to_owned());
			Err(anyhow::anyhow!("handler failed on purpose"))
		}),
	)?;
	c.append_event_binding("panic", Handler::new(|_: &mut Journal| panic!("handler panicked on purpose")))?;
	c.append_event_binding(
		"hang",
		Handler::future(|journal: &mut Journal| {
			journal.hanging.notify_one();
			futures::future::pending().boxed()
		}),
	)?;
	c.append_event_binding(
		"echo",
		Handler::with_event(|journal: &mut Journal, payload| {
			journal.entries.push(payload.map_or_else(|| "null".to_owned(), |payload| payload.to_string()));
			Ok(())
		}),
	)?;
	c.append_literal(">")?;
	c.append_scalar(state.entries.len(), None)?;
	c.append_literal("</div>")
}
