//! One interactive search session.
//!
//! Owns the request parameters the user edits and turns each command into
//! coordinator calls, returning the text to print.

use lookahead_core::{PrefetchOutcome, SearchCoordinator, SearchParams, SearchType, make_key};

use crate::command::{Command, HELP, Signal};
use crate::render;

pub struct Session {
    coordinator: SearchCoordinator,
    params: SearchParams,
    active: bool,
    window_size: u32,
    authenticated: bool,
}

impl Session {
    pub fn new(
        coordinator: SearchCoordinator, search_type: SearchType, per_page: u32, window_size: u32, authenticated: bool,
    ) -> Self {
        let params = SearchParams::new(search_type, "").with_per_page(per_page);
        Self { coordinator, params, active: false, window_size, authenticated }
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    /// Start a new search for a settled query.
    pub async fn search(&mut self, query: String) -> String {
        self.params.query = query;
        self.params.page = 1;
        self.active = true;
        self.load().await
    }

    async fn load(&mut self) -> String {
        let key = make_key(&self.params);
        match self.coordinator.fetch(&self.params).await {
            Ok(result) => {
                let total_pages = self.coordinator.total_pages().unwrap_or(0);
                let window = self.coordinator.window(self.window_size);
                render::render_page(&key, &result, &window, total_pages)
            }
            Err(e) => render::render_error(&e),
        }
    }

    async fn navigate(&mut self, target: u32) -> String {
        if let Some(total) = self.coordinator.total_pages()
            && (target == 0 || target > total)
        {
            return format!("page {target} is out of range (1-{total})");
        }
        if target == 0 {
            return "already on the first page".into();
        }
        self.params.page = target;
        self.load().await
    }

    /// Settings changed: restart at page 1 if something is on screen.
    async fn reload(&mut self, note: String) -> String {
        self.params.page = 1;
        if self.active { format!("{note}\n{}", self.load().await) } else { note }
    }

    pub async fn execute(&mut self, command: Command) -> String {
        let navigation = matches!(
            command,
            Command::Next
                | Command::Prev
                | Command::First
                | Command::Last
                | Command::Goto(_)
                | Command::Hover(..)
                | Command::Prefetch(_)
        );
        if navigation && !self.active {
            return "no active search; type a query first".into();
        }

        let page = self.params.page;
        match command {
            Command::Query(query) => self.search(query).await,
            Command::Next => self.navigate(page.saturating_add(1)).await,
            Command::Prev => self.navigate(page.saturating_sub(1)).await,
            Command::First => self.navigate(1).await,
            Command::Last => match self.coordinator.total_pages() {
                Some(total) if total > 0 => self.navigate(total).await,
                _ => "total page count not known yet".into(),
            },
            Command::Goto(target) => self.navigate(target).await,
            Command::Hover(signal, target) => {
                let handlers = self.coordinator.hover_handlers_for(target);
                let armed = match signal {
                    Signal::Enter => handlers.on_enter(),
                    Signal::Focus => handlers.on_focus(),
                    Signal::TouchStart => handlers.on_touch_start(),
                };
                if armed {
                    format!("page {target} will be prefetched unless the signal repeats")
                } else {
                    format!("page {target} ignored (cached, out of range, or hover prefetch disabled)")
                }
            }
            Command::Prefetch(target) => match self.coordinator.prefetch_page(target).await {
                PrefetchOutcome::Completed => format!("page {target} cached"),
                PrefetchOutcome::AlreadyRequested => format!("page {target} already cached or in flight"),
                PrefetchOutcome::OutOfRange => format!("page {target} is outside the reachable window"),
                PrefetchOutcome::Failed => format!("prefetch of page {target} failed (see log)"),
            },
            Command::Type(search_type) if search_type.requires_auth() && !self.authenticated => {
                let current = self.params.search_type;
                format!("{search_type} search needs a token; set LOOKAHEAD_GITHUB_TOKEN (still searching {current})")
            }
            Command::Type(search_type) => {
                self.params.search_type = search_type;
                self.params.sort = search_type.default_sort().to_string();
                self.params.extra.clear();
                let note = format!("type: {search_type} (sort {})", self.params.sort);
                self.reload(note).await
            }
            Command::Sort(sort) => {
                let note = format!("sort: {sort}");
                self.params.sort = sort;
                self.reload(note).await
            }
            Command::Order(order) => {
                self.params.order = order;
                self.reload(format!("order: {order}")).await
            }
            Command::PerPage(per_page) => {
                self.params.per_page = per_page;
                self.reload(format!("per page: {per_page}")).await
            }
            Command::Param { name, value } => {
                let note = if value.is_empty() {
                    self.params.extra.remove(&name);
                    format!("param {name} removed")
                } else {
                    let note = format!("param {name}={value}");
                    self.params.extra.insert(name, value);
                    note
                };
                self.reload(note).await
            }
            Command::Stats => {
                let store = self.coordinator.store();
                let stats = store.stats();
                let prefetch = self.coordinator.prefetch();
                format!(
                    "cache: {} resolved, {} pending\nprefetch: idle {}, {} hover timer(s)",
                    stats.resolved,
                    stats.pending,
                    if prefetch.idle_armed() { "armed" } else { "not armed" },
                    prefetch.hover_pending()
                )
            }
            Command::Help => HELP.to_string(),
            Command::Quit => String::new(),
        }
    }
}
