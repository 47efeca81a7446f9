use tokio::sync::watch;

/// "Documents changed" notification over a bumped generation counter.
#[derive(Debug, Clone)]
pub struct ChangeSignal {
    sender: watch::Sender<u64>,
}

impl ChangeSignal {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(0);
        Self { sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.sender.subscribe()
    }

    pub fn notify(&self) {
        self.sender.send_modify(|generation| *generation += 1);
    }
}

impl Default for ChangeSignal {
    fn default() -> Self {
        Self::new()
    }
}
