#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Frame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalRequest {
    pub kind: MediaKind,
    pub src: String,
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModalState {
    #[default]
    Closed,
    ShowingImage,
    ShowingVideo,
    ShowingFrame,
}

#[derive(Debug, Default)]
pub struct ModalViewer {
    state: ModalState,
    image_src: String,
    video_src: String,
    frame_src: String,
    caption: String,
    video_playing: bool,
    scroll_suspended: bool,
}

impl ModalViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ModalState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != ModalState::Closed
    }

    pub fn caption(&self) -> Option<&str> {
        let trimmed = self.caption.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    pub fn active_src(&self) -> Option<&str> {
        match self.state {
            ModalState::Closed => None,
            ModalState::ShowingImage => Some(&self.image_src),
            ModalState::ShowingVideo => Some(&self.video_src),
            ModalState::ShowingFrame => Some(&self.frame_src),
        }
    }

    pub fn image_src(&self) -> &str {
        &self.image_src
    }

    pub fn video_src(&self) -> &str {
        &self.video_src
    }

    pub fn frame_src(&self) -> &str {
        &self.frame_src
    }

    pub fn video_playing(&self) -> bool {
        self.video_playing
    }

    pub fn scroll_suspended(&self) -> bool {
        self.scroll_suspended
    }

    pub fn toggle_video(&mut self) {
        if self.state == ModalState::ShowingVideo {
            self.video_playing = !self.video_playing;
        }
    }

    pub fn open(&mut self, request: ModalRequest) {
        self.clear_slots();
        self.caption = request.caption;
        self.state = match request.kind {
            MediaKind::Image => {
                self.image_src = request.src;
                ModalState::ShowingImage
            }
            MediaKind::Video => {
                self.video_src = request.src;
                self.video_playing = true;
                ModalState::ShowingVideo
            }
            MediaKind::Frame => {
                self.frame_src = request.src;
                ModalState::ShowingFrame
            }
        };
        self.scroll_suspended = true;
    }

    pub fn close(&mut self) {
        self.clear_slots();
        self.caption.clear();
        self.state = ModalState::Closed;
        self.scroll_suspended = false;
    }

    fn clear_slots(&mut self) {
        self.video_playing = false;
        self.image_src.clear();
        self.video_src.clear();
        self.frame_src.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: MediaKind, src: &str) -> ModalRequest {
        ModalRequest {
            kind,
            src: src.to_string(),
            caption: String::new(),
        }
    }

    #[test]
    fn open_then_close_clears_everything() {
        let mut viewer = ModalViewer::new();
        viewer.open(request(MediaKind::Image, "x.jpg"));
        assert_eq!(viewer.state(), &ModalState::ShowingImage);
        assert_eq!(viewer.active_src(), Some("x.jpg"));
        assert!(viewer.scroll_suspended());

        viewer.close();
        assert_eq!(viewer.state(), &ModalState::Closed);
        assert!(viewer.image_src().is_empty());
        assert!(viewer.video_src().is_empty());
        assert!(viewer.frame_src().is_empty());
        assert!(!viewer.scroll_suspended());
    }

    #[test]
    fn opening_a_slot_clears_the_others() {
        let mut viewer = ModalViewer::new();
        viewer.open(request(MediaKind::Video, "clip.mp4"));
        assert!(viewer.video_playing());
        viewer.open(request(MediaKind::Frame, "https://e.test/embed"));
        assert_eq!(viewer.state(), &ModalState::ShowingFrame);
        assert!(viewer.video_src().is_empty());
        assert!(!viewer.video_playing());
    }

    #[test]
    fn close_is_idempotent() {
        let mut viewer = ModalViewer::new();
        viewer.close();
        viewer.close();
        assert_eq!(viewer.state(), &ModalState::Closed);
    }

    #[test]
    fn caption_shown_only_when_non_blank() {
        let mut viewer = ModalViewer::new();
        viewer.open(ModalRequest {
            kind: MediaKind::Image,
            src: "x.jpg".into(),
            caption: "   ".into(),
        });
        assert_eq!(viewer.caption(), None);
        viewer.open(ModalRequest {
            kind: MediaKind::Image,
            src: "x.jpg".into(),
            caption: "hello".into(),
        });
        assert_eq!(viewer.caption(), Some("hello"));
    }
}
