//! Session data structures.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use skylark_core::types::{
    now_ts, BookingStep, ContactDetails, FlightResult, PassengerDetails, PaymentDetails,
    TravelParams, TravelPreferences,
};

/// Hard cap on retained conversation history. When a message lands on a full
/// session the oldest message is evicted first.
pub const MAX_HISTORY_MESSAGES: usize = 20;

/// Who authored a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One turn of conversation history. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: i64,
    /// Flight options presented by this reply, in the order shown.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flight_options: Vec<FlightResult>,
    /// Next actions suggested alongside this reply.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_actions: Vec<String>,
    /// The booking step this turn moved the flow to, when it advanced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_step: Option<BookingStep>,
}

impl ConversationMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: now_ts(),
            flight_options: Vec::new(),
            suggested_actions: Vec::new(),
            booking_step: None,
        }
    }
}

/// Everything one conversation has established so far.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Authenticated traveller, when the channel knows one. Sessions are
    /// keyed by conversation id, not by user.
    pub user_id: Option<String>,
    pub history: Vec<ConversationMessage>,
    /// Travel parameters extracted across the whole conversation.
    pub params: TravelParams,
    pub preferences: TravelPreferences,
    /// Results of the most recent flight search, in presentation order.
    /// Ordinal references ("the second one") resolve against this list.
    pub last_results: Vec<FlightResult>,
    pub selected_flight: Option<FlightResult>,
    pub passenger: Option<PassengerDetails>,
    pub contact: Option<ContactDetails>,
    pub payment: Option<PaymentDetails>,
    /// Set when the confirmation step completes.
    pub booking_reference: Option<String>,
    pub created_at: i64,
    pub last_activity_at: i64,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = now_ts();
        Self {
            id: id.into(),
            user_id: None,
            history: Vec::new(),
            params: TravelParams::default(),
            preferences: TravelPreferences::default(),
            last_results: Vec::new(),
            selected_flight: None,
            passenger: None,
            contact: None,
            payment: None,
            booking_reference: None,
            created_at: now,
            last_activity_at: now,
        }
    }

    /// Append a message, evicting the oldest once the cap is reached.
    pub fn push(&mut self, message: ConversationMessage) {
        self.history.push(message);
        while self.history.len() > MAX_HISTORY_MESSAGES {
            self.history.remove(0);
        }
    }

    /// Append a bare text message with no attachments.
    pub fn push_message(&mut self, role: MessageRole, content: impl Into<String>) {
        self.push(ConversationMessage::new(role, content));
    }

    /// The most recent `turns` messages, oldest first. Used to give the
    /// language oracle short-range conversational context.
    pub fn recent_history(&self, turns: usize) -> &[ConversationMessage] {
        let start = self.history.len().saturating_sub(turns);
        &self.history[start..]
    }

    /// Whether this session has been idle for longer than the TTL.
    pub fn is_expired(&self, ttl_minutes: u64, now: i64) -> bool {
        let idle = now.saturating_sub(self.last_activity_at);
        idle > (ttl_minutes as i64).saturating_mul(60)
    }

    /// Refresh the idle clock.
    pub fn touch(&mut self) {
        self.last_activity_at = now_ts();
    }

    /// The first booking step that still needs input, or `None` once the
    /// booking is complete.
    pub fn next_step(&self) -> Option<BookingStep> {
        BookingStep::ALL.into_iter().find(|step| match step {
            BookingStep::FlightSelection => self.selected_flight.is_none(),
            BookingStep::PassengerInfo => self.passenger.is_none(),
            BookingStep::ContactInfo => self.contact.is_none(),
            BookingStep::Payment => self.payment.is_none(),
            BookingStep::Confirmation => self.booking_reference.is_none(),
        })
    }

    /// True once a flight has been selected but the booking is not yet
    /// confirmed, i.e. the conversation is mid-flow.
    pub fn booking_in_progress(&self) -> bool {
        self.selected_flight.is_some() && self.booking_reference.is_none()
    }

    /// Drop all booking-flow progress, keeping search context. Used when the
    /// traveller abandons a booking or starts over after confirmation.
    pub fn reset_booking(&mut self) {
        self.selected_flight = None;
        self.passenger = None;
        self.contact = None;
        self.payment = None;
        self.booking_reference = None;
    }
}
