/// Progress reported by a running download.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    PieceCompleted {
        piece: usize,
        completed: usize,
        total: usize,
        active_peers: usize,
    },
    DownloadComplete,
}

impl Notification {
    /// Percentage of pieces done, if this is a piece completion.
    pub fn percent(&self) -> Option<f64> {
        match self {
            Self::PieceCompleted {
                completed, total, ..
            } => Some(*completed as f64 / *total as f64 * 100.0),
            Self::DownloadComplete => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent() {
        let notification = Notification::PieceCompleted {
            piece: 3,
            completed: 1,
            total: 4,
            active_peers: 2,
        };

        assert_eq!(notification.percent(), Some(25.0));
        assert_eq!(Notification::DownloadComplete.percent(), None);
    }
}
