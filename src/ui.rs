use std::collections::HashMap;
use std::io::Stdout;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseEvent,
    MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::wrap;
use unicode_width::UnicodeWidthStr;

use crate::card::{GalleryCard, LazyRegistrar, MediaSlot, NewsCard, NewsThumb};
use crate::config;
use crate::feed::{self, FeedError, FeedSource};
use crate::lazy::LazyLoader;
use crate::media;
use crate::modal::{ModalState, ModalViewer};
use crate::preview;
use crate::resolve;

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_TAG: Color = Color::Rgb(166, 227, 161);
const COLOR_WARNING: Color = Color::Rgb(243, 139, 168);

const GALLERY_CARD_ROWS: u16 = 3;
const NEWS_CARD_ROWS: u16 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedTab {
    Gallery,
    News,
}

enum FeedState<T> {
    Loading,
    Ready(T),
    Failed(String),
}

enum AsyncResponse {
    GalleryCsv(Result<String, FeedError>),
    NewsCsv(Result<String, FeedError>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MediaState {
    Deferred,
    Fetching,
    Loaded(media::MediaEntry),
    VideoReady,
}

pub struct Options {
    pub config: config::Config,
    pub gallery_source: Option<Arc<dyn FeedSource>>,
    pub news_source: Option<Arc<dyn FeedSource>>,
    pub media_manager: Option<media::Manager>,
    pub media_rx: Receiver<media::Fetched>,
    pub preview_manager: Option<preview::Manager>,
    pub preview_rx: Receiver<preview::Outcome>,
    pub config_path: String,
}

pub struct Model {
    cfg: config::Config,
    gallery_source: Option<Arc<dyn FeedSource>>,
    news_source: Option<Arc<dyn FeedSource>>,

    gallery: FeedState<feed::GalleryFeed>,
    news: FeedState<feed::NewsFeed>,
    tab: FeedTab,
    selected_gallery: usize,
    selected_news: usize,
    offset_gallery: usize,
    offset_news: usize,
    view_rows: u16,

    lazy: LazyLoader,
    modal: ModalViewer,
    modal_content_area: Option<Rect>,

    media_manager: Option<media::Manager>,
    media_rx: Receiver<media::Fetched>,
    media_states: HashMap<u64, MediaState>,

    preview_manager: Option<preview::Manager>,
    preview_rx: Receiver<preview::Outcome>,

    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,

    status: String,
    config_path: String,
}

struct RegistrarBinding<'a> {
    lazy: &'a mut LazyLoader,
    immediate: Vec<crate::lazy::Assignment>,
}

impl LazyRegistrar for RegistrarBinding<'_> {
    fn defer(&mut self, card_id: u64, url: String) {
        if let Some(assignment) = self.lazy.defer(card_id, url) {
            self.immediate.push(assignment);
        }
    }
}

impl Model {
    pub fn new(options: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        let lazy = LazyLoader::new(options.config.lazy.margin_rows, options.config.lazy.bypass);
        Self {
            cfg: options.config,
            gallery_source: options.gallery_source,
            news_source: options.news_source,
            gallery: FeedState::Loading,
            news: FeedState::Loading,
            tab: FeedTab::Gallery,
            selected_gallery: 0,
            selected_news: 0,
            offset_gallery: 0,
            offset_news: 0,
            view_rows: 0,
            lazy,
            modal: ModalViewer::new(),
            modal_content_area: None,
            media_manager: options.media_manager,
            media_rx: options.media_rx,
            media_states: HashMap::new(),
            preview_manager: options.preview_manager,
            preview_rx: options.preview_rx,
            response_tx,
            response_rx,
            status: "Loading feeds...".into(),
            config_path: options.config_path,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode().context("enable raw mode")?;
        let mut stdout = std::io::stdout();
        stdout
            .execute(EnterAlternateScreen)
            .context("enter alternate screen")?;
        stdout
            .execute(EnableMouseCapture)
            .context("enable mouse capture")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("create terminal")?;

        self.queue_feed_fetches();

        let result = self.event_loop(&mut terminal);

        let mut stdout = std::io::stdout();
        let _ = stdout.execute(DisableMouseCapture);
        let _ = stdout.execute(LeaveAlternateScreen);
        let _ = disable_raw_mode();
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            self.drain_responses();
            self.fire_lazy();
            terminal.draw(|frame| self.draw(frame))?;

            if event::poll(Duration::from_millis(100)).context("poll events")? {
                match event::read().context("read event")? {
                    Event::Key(key) if key.kind != KeyEventKind::Release => {
                        if self.handle_key(key.code) {
                            return Ok(());
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => {}
                }
            }
        }
    }

    fn queue_feed_fetches(&mut self) {
        self.gallery = FeedState::Loading;
        self.news = FeedState::Loading;
        // Rebuilt cards reuse ids 0..N; stale watcher or media state
        // would pin them to the previous rows' media.
        self.lazy.reset();
        self.media_states.clear();

        match self.gallery_source.clone() {
            Some(source) => {
                let tx = self.response_tx.clone();
                thread::spawn(move || {
                    let _ = tx.send(AsyncResponse::GalleryCsv(source.fetch_csv()));
                });
            }
            None => {
                self.gallery =
                    FeedState::Failed("Gallery feed URL is not configured".into());
            }
        }
        match self.news_source.clone() {
            Some(source) => {
                let tx = self.response_tx.clone();
                thread::spawn(move || {
                    let _ = tx.send(AsyncResponse::NewsCsv(source.fetch_csv()));
                });
            }
            None => {
                self.news = FeedState::Failed("News feed URL is not configured".into());
            }
        }
    }

    fn drain_responses(&mut self) {
        while let Ok(response) = self.response_rx.try_recv() {
            match response {
                AsyncResponse::GalleryCsv(Ok(text)) => self.build_gallery(&text),
                AsyncResponse::GalleryCsv(Err(err)) => {
                    self.gallery = FeedState::Failed(feed_failure_message(&err));
                }
                AsyncResponse::NewsCsv(Ok(text)) => self.build_news(&text),
                AsyncResponse::NewsCsv(Err(err)) => {
                    self.news = FeedState::Failed(feed_failure_message(&err));
                }
            }
        }

        while let Ok(fetched) = self.media_rx.try_recv() {
            self.apply_media_result(fetched);
        }

        while let Ok(outcome) = self.preview_rx.try_recv() {
            self.apply_preview_outcome(outcome);
        }
    }

    fn build_gallery(&mut self, text: &str) {
        let columns = self.cfg.feeds.gallery_columns;
        let mut binding = RegistrarBinding {
            lazy: &mut self.lazy,
            immediate: Vec::new(),
        };
        let built = feed::build_gallery(text, &columns, &mut binding, 0);
        let immediate = binding.immediate;

        for card in &built.cards {
            if self.lazy.is_pending(card.id) {
                self.media_states.insert(card.id, MediaState::Deferred);
            }
        }
        self.status = format!("{} items", built.item_count());
        self.gallery = FeedState::Ready(built);
        self.selected_gallery = 0;
        self.offset_gallery = 0;
        for assignment in immediate {
            self.start_fetch(assignment.card_id, &assignment.url);
        }
    }

    fn build_news(&mut self, text: &str) {
        let columns = self.cfg.feeds.news_columns;
        let mut binding = RegistrarBinding {
            lazy: &mut self.lazy,
            immediate: Vec::new(),
        };
        let built = feed::build_news(text, &columns, &mut binding, feed::NEWS_ID_BASE);
        let immediate = binding.immediate;

        for card in &built.cards {
            if self.lazy.is_pending(card.id) {
                self.media_states.insert(card.id, MediaState::Deferred);
            }
        }
        if let Some(manager) = &self.preview_manager {
            feed::schedule_enrichment(&built, manager);
        }
        self.news = FeedState::Ready(built);
        self.selected_news = 0;
        self.offset_news = 0;
        for assignment in immediate {
            self.start_fetch(assignment.card_id, &assignment.url);
        }
    }

    fn apply_media_result(&mut self, fetched: media::Fetched) {
        match fetched.result {
            Ok(entry) => {
                self.media_states
                    .insert(fetched.card_id, MediaState::Loaded(entry));
            }
            Err(_) => {
                // Walk the card's fallback chain one tier.
                let retry = self.card_media_error(fetched.card_id);
                match retry {
                    Some(url) => self.start_fetch(fetched.card_id, &url),
                    None => {
                        self.media_states.remove(&fetched.card_id);
                    }
                }
            }
        }
    }

    fn card_media_error(&mut self, card_id: u64) -> Option<String> {
        if let FeedState::Ready(gallery) = &mut self.gallery {
            if let Some(card) = gallery.cards.iter_mut().find(|card| card.id == card_id) {
                return card.media_error();
            }
        }
        if let FeedState::Ready(news) = &mut self.news {
            if let Some(card) = news.cards.iter_mut().find(|card| card.id == card_id) {
                card.media_error();
            }
        }
        None
    }

    fn apply_preview_outcome(&mut self, outcome: preview::Outcome) {
        let opts = crate::card::ApplyOptions {
            prefer_enriched_description: self.cfg.enrich.prefer_enriched_description,
            prefer_enriched_title: self.cfg.enrich.prefer_enriched_title,
        };
        let FeedState::Ready(news) = &mut self.news else {
            return;
        };
        let Some(card) = news.cards.iter_mut().find(|card| card.id == outcome.card_id) else {
            return;
        };
        if let Some(image_url) = card.apply_preview(&outcome.metadata, &opts) {
            let card_id = card.id;
            self.start_fetch(card_id, &image_url);
        }
    }

    fn fire_lazy(&mut self) {
        let mut near: Vec<u64> = Vec::new();
        collect_near_ids(
            &self.gallery_card_ids(),
            self.offset_gallery,
            self.view_rows,
            GALLERY_CARD_ROWS,
            self.lazy.margin_rows(),
            &mut near,
        );
        collect_near_ids(
            &self.news_card_ids(),
            self.offset_news,
            self.view_rows,
            NEWS_CARD_ROWS,
            self.lazy.margin_rows(),
            &mut near,
        );

        for assignment in self.lazy.observe(&near) {
            self.start_fetch(assignment.card_id, &assignment.url);
        }
    }

    fn gallery_card_ids(&self) -> Vec<u64> {
        match &self.gallery {
            FeedState::Ready(gallery) => gallery.cards.iter().map(|card| card.id).collect(),
            _ => Vec::new(),
        }
    }

    fn news_card_ids(&self) -> Vec<u64> {
        match &self.news {
            FeedState::Ready(news) => news.cards.iter().map(|card| card.id).collect(),
            _ => Vec::new(),
        }
    }

    fn start_fetch(&mut self, card_id: u64, url: &str) {
        if resolve::is_direct_video(url) {
            // Native video is streamed at playback time, not prefetched.
            self.media_states.insert(card_id, MediaState::VideoReady);
            return;
        }
        match &self.media_manager {
            Some(manager) => {
                self.media_states.insert(card_id, MediaState::Fetching);
                manager.enqueue(card_id, url);
            }
            None => {
                self.media_states.remove(&card_id);
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> bool {
        if self.modal.is_open() {
            match code {
                KeyCode::Esc | KeyCode::Char('x') | KeyCode::Char('q') => self.modal.close(),
                KeyCode::Char(' ') => self.modal.toggle_video(),
                KeyCode::Char('o') => self.open_modal_source(),
                _ => {}
            }
            return false;
        }

        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Tab => {
                self.tab = match self.tab {
                    FeedTab::Gallery => FeedTab::News,
                    FeedTab::News => FeedTab::Gallery,
                };
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Char('g') => self.jump_selection(0),
            KeyCode::Char('G') => self.jump_selection(usize::MAX),
            KeyCode::Char('r') => self.queue_feed_fetches(),
            KeyCode::Enter => self.activate_selected(),
            KeyCode::Char('o') => self.open_selected_external(),
            _ => {}
        }
        false
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if !self.modal.is_open() {
            return;
        }
        if let MouseEventKind::Down(_) = mouse.kind {
            // A click on the overlay background, outside the content
            // box, closes the viewer.
            let inside = self
                .modal_content_area
                .map(|area| {
                    mouse.column >= area.x
                        && mouse.column < area.x + area.width
                        && mouse.row >= area.y
                        && mouse.row < area.y + area.height
                })
                .unwrap_or(false);
            if !inside {
                self.modal.close();
            }
        }
    }

    fn feed_len(&self) -> usize {
        match self.tab {
            FeedTab::Gallery => match &self.gallery {
                FeedState::Ready(gallery) => gallery.cards.len(),
                _ => 0,
            },
            FeedTab::News => match &self.news {
                FeedState::Ready(news) => news.cards.len(),
                _ => 0,
            },
        }
    }

    fn move_selection(&mut self, delta: i64) {
        if self.modal.scroll_suspended() {
            return;
        }
        let len = self.feed_len();
        if len == 0 {
            return;
        }
        let selected = match self.tab {
            FeedTab::Gallery => &mut self.selected_gallery,
            FeedTab::News => &mut self.selected_news,
        };
        let next = selected.saturating_add_signed(delta as isize).min(len - 1);
        *selected = next;
        self.clamp_offset();
    }

    fn jump_selection(&mut self, index: usize) {
        if self.modal.scroll_suspended() {
            return;
        }
        let len = self.feed_len();
        if len == 0 {
            return;
        }
        let target = index.min(len - 1);
        match self.tab {
            FeedTab::Gallery => self.selected_gallery = target,
            FeedTab::News => self.selected_news = target,
        }
        self.clamp_offset();
    }

    fn clamp_offset(&mut self) {
        let card_rows = match self.tab {
            FeedTab::Gallery => GALLERY_CARD_ROWS,
            FeedTab::News => NEWS_CARD_ROWS,
        };
        let visible = visible_cards(self.view_rows, card_rows).max(1);
        let (selected, offset) = match self.tab {
            FeedTab::Gallery => (self.selected_gallery, &mut self.offset_gallery),
            FeedTab::News => (self.selected_news, &mut self.offset_news),
        };
        if selected < *offset {
            *offset = selected;
        } else if selected >= *offset + visible {
            *offset = selected + 1 - visible;
        }
    }

    fn activate_selected(&mut self) {
        match self.tab {
            FeedTab::Gallery => {
                let FeedState::Ready(gallery) = &self.gallery else {
                    return;
                };
                let Some(card) = gallery.cards.get(self.selected_gallery) else {
                    return;
                };
                let card = card.clone();
                if !card.activate(&mut self.modal) {
                    // Warnings have no modal target; use the escape
                    // hatch instead.
                    let _ = webbrowser::open(card.original_link());
                }
            }
            FeedTab::News => {
                let FeedState::Ready(news) = &self.news else {
                    return;
                };
                if let Some(card) = news.cards.get(self.selected_news) {
                    let _ = webbrowser::open(card.link());
                }
            }
        }
    }

    fn open_selected_external(&mut self) {
        let link = match self.tab {
            FeedTab::Gallery => match &self.gallery {
                FeedState::Ready(gallery) => gallery
                    .cards
                    .get(self.selected_gallery)
                    .map(|card| card.original_link().to_string()),
                _ => None,
            },
            FeedTab::News => match &self.news {
                FeedState::Ready(news) => news
                    .cards
                    .get(self.selected_news)
                    .map(|card| card.link().to_string()),
                _ => None,
            },
        };
        if let Some(link) = link {
            let _ = webbrowser::open(&link);
        }
    }

    fn open_modal_source(&mut self) {
        if let Some(src) = self.modal.active_src() {
            let _ = webbrowser::open(src);
        }
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(3),
            ])
            .split(frame.size());

        self.view_rows = chunks[1].height.saturating_sub(2);
        self.draw_tabs(frame, chunks[0]);
        match self.tab {
            FeedTab::Gallery => self.draw_gallery(frame, chunks[1]),
            FeedTab::News => self.draw_news(frame, chunks[1]),
        }
        self.draw_status(frame, chunks[2]);

        if self.modal.is_open() {
            self.draw_modal(frame);
        } else {
            self.modal_content_area = None;
        }
    }

    fn draw_tabs(&self, frame: &mut Frame<'_>, area: Rect) {
        let tab_style = |tab: FeedTab| {
            if tab == self.tab {
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(COLOR_TEXT_SECONDARY)
            }
        };
        let line = Line::from(vec![
            Span::styled(" Gallery ", tab_style(FeedTab::Gallery)),
            Span::raw("  "),
            Span::styled(" News ", tab_style(FeedTab::News)),
        ]);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_BORDER_IDLE))
            .style(Style::default().bg(COLOR_BG));
        frame.render_widget(Paragraph::new(line).block(block), area);
    }

    fn draw_gallery(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = feed_block("Gallery");
        let inner_width = area.width.saturating_sub(2) as usize;
        let lines = match &self.gallery {
            FeedState::Loading => vec![Line::from(Span::styled(
                "Loading gallery...",
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ))],
            FeedState::Failed(message) => failure_lines(message),
            FeedState::Ready(gallery) => {
                let visible = visible_cards(self.view_rows, GALLERY_CARD_ROWS).max(1);
                let mut lines = Vec::new();
                for (index, card) in gallery
                    .cards
                    .iter()
                    .enumerate()
                    .skip(self.offset_gallery)
                    .take(visible)
                {
                    let selected = index == self.selected_gallery;
                    lines.extend(self.gallery_card_lines(card, selected, inner_width));
                }
                if lines.is_empty() {
                    lines.push(Line::from(Span::styled(
                        "No gallery items.",
                        Style::default().fg(COLOR_TEXT_SECONDARY),
                    )));
                }
                lines
            }
        };
        frame.render_widget(
            Paragraph::new(lines)
                .block(block)
                .style(Style::default().bg(COLOR_BG).fg(COLOR_TEXT_PRIMARY)),
            area,
        );
    }

    fn gallery_card_lines(
        &self,
        card: &GalleryCard,
        selected: bool,
        width: usize,
    ) -> Vec<Line<'static>> {
        let marker = if selected { "> " } else { "  " };
        let media = self.media_line(card.id, &card.slot);
        let caption = if card.caption.is_empty() {
            Span::styled("(no caption)", Style::default().fg(COLOR_TEXT_SECONDARY))
        } else {
            Span::styled(
                truncate_to_width(&card.caption, width.saturating_sub(4)),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            )
        };
        let title_style = if selected {
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_PRIMARY)
        };
        vec![
            Line::from(vec![Span::styled(marker.to_string(), title_style), media]),
            Line::from(vec![Span::raw("    "), caption]),
            Line::default(),
        ]
    }

    fn media_line(&self, card_id: u64, slot: &MediaSlot) -> Span<'static> {
        match slot {
            MediaSlot::Warning { message, .. } => Span::styled(
                format!("! {message} (o opens the original link)"),
                Style::default().fg(COLOR_WARNING),
            ),
            MediaSlot::Video { src, .. } => match self.media_states.get(&card_id) {
                Some(MediaState::VideoReady) => Span::styled(
                    format!("[video] {} (Enter to view)", short_url(src)),
                    Style::default().fg(COLOR_ACCENT),
                ),
                _ => skeleton_span(),
            },
            MediaSlot::FrameThumb { .. } => match self.media_states.get(&card_id) {
                Some(MediaState::Loaded(entry)) => Span::styled(
                    format!("[> video] thumbnail {} (Enter to view)", entry_info(entry)),
                    Style::default().fg(COLOR_ACCENT),
                ),
                _ => skeleton_span(),
            },
            MediaSlot::Image { current, .. } => match self.media_states.get(&card_id) {
                Some(MediaState::Loaded(entry)) => Span::styled(
                    format!("[image] {} {}", short_url(current), entry_info(entry)),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                ),
                Some(MediaState::Fetching) => skeleton_span(),
                _ => skeleton_span(),
            },
        }
    }

    fn draw_news(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = feed_block("News");
        let inner_width = area.width.saturating_sub(2) as usize;
        let lines = match &self.news {
            FeedState::Loading => vec![Line::from(Span::styled(
                "Loading news...",
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ))],
            FeedState::Failed(message) => failure_lines(message),
            FeedState::Ready(news) => {
                let visible = visible_cards(self.view_rows, NEWS_CARD_ROWS).max(1);
                let mut lines = Vec::new();
                for (index, card) in news
                    .cards
                    .iter()
                    .enumerate()
                    .skip(self.offset_news)
                    .take(visible)
                {
                    let selected = index == self.selected_news;
                    lines.extend(self.news_card_lines(card, selected, inner_width));
                }
                if lines.is_empty() {
                    lines.push(Line::from(Span::styled(
                        "No news items.",
                        Style::default().fg(COLOR_TEXT_SECONDARY),
                    )));
                }
                lines
            }
        };
        frame.render_widget(
            Paragraph::new(lines)
                .block(block)
                .style(Style::default().bg(COLOR_BG).fg(COLOR_TEXT_PRIMARY)),
            area,
        );
    }

    fn news_card_lines(&self, card: &NewsCard, selected: bool, width: usize) -> Vec<Line<'static>> {
        let marker = if selected { "> " } else { "  " };
        let title_style = if selected {
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD)
        };
        let title = if card.item.title.is_empty() {
            short_url(&card.item.link)
        } else {
            truncate_to_width(&card.item.title, width.saturating_sub(4))
        };

        let mut meta_spans: Vec<Span<'static>> = vec![Span::raw("    ")];
        if let Some(date) = card.item.published_at {
            meta_spans.push(Span::styled(
                date.format("%d %b %Y").to_string(),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ));
            meta_spans.push(Span::raw("  "));
        }
        if !card.item.tag.is_empty() {
            meta_spans.push(Span::styled(
                format!("[{}]", card.item.tag),
                Style::default().fg(COLOR_TAG),
            ));
            meta_spans.push(Span::raw("  "));
        }
        meta_spans.push(self.news_thumb_span(card));

        let description = wrap(
            card.item.description.as_str(),
            width.saturating_sub(4).max(8),
        )
        .first()
        .map(|cow| cow.to_string())
        .unwrap_or_default();

        vec![
            Line::from(vec![
                Span::styled(marker.to_string(), title_style),
                Span::styled(title, title_style),
            ]),
            Line::from(meta_spans),
            Line::from(vec![
                Span::raw("    "),
                Span::styled(description, Style::default().fg(COLOR_TEXT_SECONDARY)),
            ]),
            Line::default(),
            Line::default(),
        ]
    }

    fn news_thumb_span(&self, card: &NewsCard) -> Span<'static> {
        match &card.thumb {
            NewsThumb::Image { .. } => match self.media_states.get(&card.id) {
                Some(MediaState::Loaded(entry)) => Span::styled(
                    format!("[image {}]", entry_info(entry)),
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                ),
                _ => skeleton_span(),
            },
            NewsThumb::Fallback { domain, .. } => Span::styled(
                format!("({domain})"),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ),
        }
    }

    fn draw_status(&self, frame: &mut Frame<'_>, area: Rect) {
        let keys = if self.modal.is_open() {
            "Esc/x close  space pause  o open source"
        } else {
            "j/k move  Tab feed  Enter view  o open  r refresh  q quit"
        };
        let line = Line::from(vec![
            Span::styled(
                self.status.clone(),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            ),
            Span::raw("  "),
            Span::styled(keys, Style::default().fg(COLOR_TEXT_SECONDARY)),
            Span::raw("  "),
            Span::styled(
                self.config_path.clone(),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ),
        ]);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_BORDER_IDLE))
            .style(Style::default().bg(COLOR_BG));
        frame.render_widget(Paragraph::new(line).block(block), area);
    }

    fn draw_modal(&mut self, frame: &mut Frame<'_>) {
        let area = centered_rect(70, 60, frame.size());
        self.modal_content_area = Some(area);

        let (title, body) = match self.modal.state() {
            ModalState::ShowingImage => ("Image", short_url(self.modal.image_src())),
            ModalState::ShowingVideo => (
                "Video",
                format!(
                    "{} [{}]",
                    short_url(self.modal.video_src()),
                    if self.modal.video_playing() {
                        "playing"
                    } else {
                        "paused"
                    }
                ),
            ),
            ModalState::ShowingFrame => ("Player", short_url(self.modal.frame_src())),
            ModalState::Closed => return,
        };

        let mut lines = vec![
            Line::default(),
            Line::from(Span::styled(body, Style::default().fg(COLOR_TEXT_PRIMARY))),
        ];
        if let Some(caption) = self.modal.caption() {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                caption.to_string(),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )));
        }
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "o opens this source in the browser",
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )));

        let block = Block::default()
            .title(format!(" {title} [x] "))
            .title_alignment(Alignment::Center)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_BORDER_FOCUSED))
            .style(Style::default().bg(COLOR_BG));
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(lines)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .block(block),
            area,
        );
    }
}

fn feed_block(title: &str) -> Block<'_> {
    Block::default()
        .title(format!(" {title} "))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(COLOR_BORDER_FOCUSED))
        .style(Style::default().bg(COLOR_BG))
}

fn failure_lines(message: &str) -> Vec<Line<'static>> {
    vec![
        Line::default(),
        Line::from(Span::styled(
            format!("! {message}"),
            Style::default().fg(COLOR_WARNING),
        )),
        Line::from(Span::styled(
            "Check the published CSV link and sharing permissions, then press r.",
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )),
    ]
}

fn feed_failure_message(err: &FeedError) -> String {
    match err {
        FeedError::NotConfigured => "Feed URL is not configured".into(),
        FeedError::Status(status) => format!("Feed request failed with status {status}"),
        FeedError::Transport(err) => format!("Feed request failed: {err}"),
    }
}

fn skeleton_span() -> Span<'static> {
    Span::styled(
        "\u{2591}\u{2591}\u{2591} loading",
        Style::default().fg(COLOR_TEXT_SECONDARY),
    )
}

fn entry_info(entry: &media::MediaEntry) -> String {
    match (entry.width, entry.height) {
        (Some(width), Some(height)) => {
            format!("{width}x{height} {} KB", entry.size_bytes / 1024)
        }
        _ => format!("{} KB", entry.size_bytes / 1024),
    }
}

fn short_url(url: &str) -> String {
    truncate_to_width(url, 60)
}

fn truncate_to_width(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let w = UnicodeWidthStr::width(ch.to_string().as_str());
        if used + w + 1 > max_width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push('\u{2026}');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn visible_cards(rows: u16, card_rows: u16) -> usize {
    if card_rows == 0 {
        return 0;
    }
    (rows / card_rows) as usize
}

fn collect_near_ids(
    ids: &[u64],
    offset: usize,
    view_rows: u16,
    card_rows: u16,
    margin_rows: u16,
    out: &mut Vec<u64>,
) {
    if ids.is_empty() || card_rows == 0 {
        return;
    }
    let visible = visible_cards(view_rows, card_rows);
    let margin_cards = (margin_rows as usize).div_ceil(card_rows as usize);
    let end = offset
        .saturating_add(visible)
        .saturating_add(margin_cards)
        .min(ids.len());
    let start = offset.min(ids.len());
    out.extend_from_slice(&ids[start..end]);
}
