use crate::{error::TransportError, wire::Message};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Outbound half of a connection.
///
/// Delivery guarantees beyond handing the message over are the transport's concern.
pub trait Transport {
	/// Hands one message over for delivery. Called at most once per committed batch.
	///
	/// # Errors
	///
	/// Iff the message can't be handed over, for example because the connection is closed.
	fn send(&mut self, message: Message) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
	fn send(&mut self, message: Message) -> Result<(), TransportError> {
		(**self).send(message)
	}
}

impl<T: Transport + ?Sized> Transport for Box<T> {
	fn send(&mut self, message: Message) -> Result<(), TransportError> {
		(**self).send(message)
	}
}

/// A [`Transport`] that forwards messages into a tokio channel, for a socket writer task to drain.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
	sender: mpsc::UnboundedSender<Message>,
}

impl ChannelTransport {
	#[must_use]
	pub fn new(sender: mpsc::UnboundedSender<Message>) -> Self {
		Self { sender }
	}

	/// Creates a transport together with the receiver its messages arrive at.
	#[must_use]
	pub fn channel() -> (Self, mpsc::UnboundedReceiver<Message>) {
		let (sender, receiver) = mpsc::unbounded_channel();
		(Self::new(sender), receiver)
	}

	#[must_use]
	pub fn is_closed(&self) -> bool {
		self.sender.is_closed()
	}
}

impl Transport for ChannelTransport {
	fn send(&mut self, message: Message) -> Result<(), TransportError> {
		let notifications = message.len();
		self.sender.send(message).map_err(|_| {
			warn!("Outbound channel closed, dropping message with {} notification(s)", notifications);
			TransportError::Closed
		})?;
		debug!(notifications, "Message handed to outbound channel.");
		Ok(())
	}
}
