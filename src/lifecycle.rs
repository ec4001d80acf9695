/// Identifies one request issued by a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

/// Hands out request ids and remembers which one is the latest.
///
/// A completion carrying any other id belongs to a superseded action and must
/// not touch the controller's display state.
#[derive(Debug, Default)]
pub struct RequestSequence {
    latest: u64,
    in_flight: bool,
}

impl RequestSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> RequestId {
        self.latest += 1;
        self.in_flight = true;
        RequestId(self.latest)
    }

    /// Marks `id` finished. Returns `false` if it is stale.
    pub fn finish(&mut self, id: RequestId) -> bool {
        if id.0 != self.latest {
            return false;
        }
        self.in_flight = false;
        true
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }
}
