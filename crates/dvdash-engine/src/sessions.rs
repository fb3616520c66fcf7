use dvdash_core::{timestamp_now, Action, ChannelType, Packet};
use tracing::debug;

/// Tracks calls that have started but not yet ended.
///
/// The repeater carries one call at a time, except on the two DMR
/// timeslots which may run side by side. Any start that does not fit that
/// exception means the end of every open call was lost on the bus, so
/// those calls are closed with synthesized end packets before the new start
/// is emitted.
///
/// A second start on the same slot also forces closure: the exception only
/// covers the *other* slot. The original call's end is synthesized and the
/// new start reopens the slot.
#[derive(Debug, Default)]
pub struct SessionTracker {
    open: Vec<Packet>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one packet into the tracker. Returns every packet to emit, in
    /// order: synthesized closures first, then the input start if any.
    pub fn on_packet(&mut self, packet: Packet) -> Vec<Packet> {
        match packet.action {
            Action::Start => self.on_start(packet),
            Action::End => self.on_end(&packet),
        }
    }

    fn on_start(&mut self, packet: Packet) -> Vec<Packet> {
        let mut emitted = Vec::with_capacity(self.open.len() + 1);

        if !self.coexists(packet.channel) && !self.open.is_empty() {
            let now = timestamp_now();
            for open in self.open.drain(..) {
                debug!(
                    channel = %open.channel,
                    from = %open.from,
                    to = %open.to,
                    "Synthesizing missing end packet"
                );
                emitted.push(open.closed_at(now.clone()));
            }
        }

        self.open.push(packet.clone());
        emitted.push(packet);
        emitted
    }

    fn on_end(&mut self, end: &Packet) -> Vec<Packet> {
        let quality = end.quality();
        let mut emitted = Vec::new();

        self.open.retain(|open| {
            if open.channel == end.channel {
                emitted.push(open.closed_with(end.time.clone(), quality.clone()));
                false
            } else {
                true
            }
        });

        if emitted.is_empty() {
            debug!(channel = %end.channel, "End without open call, ignoring");
        }
        emitted
    }

    /// The dual-slot exception: the start is on one DMR slot, the other slot
    /// is busy, and its own slot is free.
    fn coexists(&self, channel: ChannelType) -> bool {
        channel
            .slot_partner()
            .is_some_and(|partner| self.slot_in_use(partner) && !self.slot_in_use(channel))
    }

    /// Whether `channel` has a start not yet followed by an end.
    pub fn slot_in_use(&self, channel: ChannelType) -> bool {
        self.open.iter().any(|p| p.channel == channel)
    }

    pub fn open_sessions(&self) -> &[Packet] {
        &self.open
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}
