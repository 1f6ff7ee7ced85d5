//! Terminal services of one run: virtual files, terminal global
//! variables, the event timer, queued chart events, chart objects and
//! properties, and printed output.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::Serialize;

pub const FILE_READ: i64 = 1;
pub const FILE_WRITE: i64 = 2;
pub const FILE_CSV: i64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GlobalVariable {
    pub value: f64,
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartEvent {
    pub id: i64,
    pub lparam: i64,
    pub dparam: f64,
    pub sparam: String,
}

/// Object kind or sub-window filter matching everything.
pub const ANY: i64 = -1;

/// A named chart object: up to three anchor points plus free-form
/// integer, double and string properties keyed by property id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartObject {
    pub name: String,
    pub kind: i64,
    pub window: i64,
    /// `(time, price)` anchors.
    pub points: [(i64, f64); 3],
    pub text: String,
    pub integers: BTreeMap<i64, i64>,
    pub doubles: BTreeMap<i64, f64>,
    pub strings: BTreeMap<i64, String>,
}

impl ChartObject {
    pub fn new(name: &str, kind: i64, window: i64) -> Self {
        ChartObject {
            name: name.to_string(),
            kind,
            window,
            points: [(0, 0.0); 3],
            text: String::new(),
            integers: BTreeMap::new(),
            doubles: BTreeMap::new(),
            strings: BTreeMap::new(),
        }
    }

    fn matches(&self, window: i64, kind: i64) -> bool {
        (window == ANY || self.window == window) && (kind == ANY || self.kind == kind)
    }

    /// Price on the line through anchors 0 and 1 at `time`; the first
    /// anchor's price when both share a time.
    pub fn value_at(&self, time: i64) -> f64 {
        let [(t1, p1), (t2, p2), _] = self.points;
        if t1 == t2 {
            return p1;
        }
        p1 + (p2 - p1) * (time - t1) as f64 / (t2 - t1) as f64
    }

    /// Time at which the line through anchors 0 and 1 reaches `price`, or
    /// 0 for a flat line.
    pub fn time_at(&self, price: f64) -> i64 {
        let [(t1, p1), (t2, p2), _] = self.points;
        if p1 == p2 {
            return 0;
        }
        t1 + ((price - p1) / (p2 - p1) * (t2 - t1) as f64).round() as i64
    }
}

#[derive(Debug, Clone)]
struct OpenFile {
    name: String,
    position: usize,
    delimiter: char,
    csv: bool,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    interval: i64,
    next_due: i64,
}

#[derive(Debug, Default)]
pub struct Terminal {
    files: HashMap<String, String>,
    handles: HashMap<i64, OpenFile>,
    next_handle: i64,
    globals: BTreeMap<String, GlobalVariable>,
    timer: Option<Timer>,
    chart_events: VecDeque<ChartEvent>,
    log: Vec<String>,
    comment: String,
    /// Chart objects in creation order.
    objects: Vec<ChartObject>,
    chart_integers: HashMap<i64, i64>,
    chart_doubles: HashMap<i64, f64>,
    chart_strings: HashMap<i64, String>,
}

impl Terminal {
    pub fn new() -> Self {
        Self::default()
    }

    // ----- files -----

    /// Open `name` and return a handle, or -1. Reading a missing file
    /// fails; `FILE_WRITE` without `FILE_READ` truncates.
    pub fn open(&mut self, name: &str, flags: i64, delimiter: char) -> i64 {
        let exists = self.files.contains_key(name);
        if flags & FILE_WRITE == 0 && !exists {
            return -1;
        }
        let data = self.files.entry(name.to_string()).or_default();
        let mut position = 0;
        if flags & FILE_WRITE != 0 {
            if flags & FILE_READ == 0 {
                data.clear();
            } else {
                position = data.len();
            }
        }
        self.next_handle += 1;
        self.handles.insert(
            self.next_handle,
            OpenFile {
                name: name.to_string(),
                position,
                delimiter,
                csv: flags & FILE_CSV != 0,
            },
        );
        self.next_handle
    }

    pub fn close(&mut self, handle: i64) {
        self.handles.remove(&handle);
    }

    /// Append text at the end of the file. Returns bytes written.
    pub fn write(&mut self, handle: i64, text: &str) -> usize {
        let Some(open) = self.handles.get_mut(&handle) else {
            return 0;
        };
        let data = self.files.entry(open.name.clone()).or_default();
        data.push_str(text);
        open.position = data.len();
        text.len()
    }

    /// Write fields joined by the handle's delimiter and end the line.
    pub fn write_fields(&mut self, handle: i64, fields: &[String]) -> usize {
        let Some(delimiter) = self.handles.get(&handle).map(|o| o.delimiter) else {
            return 0;
        };
        let line = fields.join(&delimiter.to_string()) + "\n";
        self.write(handle, &line)
    }

    /// Read the next field (CSV handles) or line (text handles).
    pub fn read_string(&mut self, handle: i64) -> String {
        let Some(open) = self.handles.get_mut(&handle) else {
            return String::new();
        };
        let Some(data) = self.files.get(&open.name) else {
            return String::new();
        };
        let rest = data.get(open.position..).unwrap_or("");
        let end = rest
            .find(|c: char| c == '\n' || (open.csv && c == open.delimiter))
            .unwrap_or(rest.len());
        let field = rest[..end].trim_end_matches('\r').to_string();
        open.position += (end + 1).min(rest.len());
        field
    }

    pub fn is_ending(&self, handle: i64) -> bool {
        match self.handles.get(&handle) {
            Some(open) => self
                .files
                .get(&open.name)
                .is_none_or(|data| open.position >= data.len()),
            None => true,
        }
    }

    pub fn delete_file(&mut self, name: &str) -> bool {
        self.files.remove(name).is_some()
    }

    pub fn file_exists(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn file_contents(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    // ----- global variables -----

    pub fn set_global(&mut self, name: &str, value: f64, time: i64) -> i64 {
        self.globals
            .insert(name.to_string(), GlobalVariable { value, time });
        time
    }

    pub fn global(&self, name: &str) -> Option<GlobalVariable> {
        self.globals.get(name).copied()
    }

    pub fn delete_global(&mut self, name: &str) -> bool {
        self.globals.remove(name).is_some()
    }

    /// Set `name` to `value` when it is missing or currently equals `check`.
    pub fn set_global_on_condition(&mut self, name: &str, value: f64, check: f64, time: i64) -> bool {
        match self.globals.get(name) {
            Some(existing) if existing.value != check => false,
            _ => {
                self.set_global(name, value, time);
                true
            }
        }
    }

    /// Delete every variable whose name starts with `prefix`. Returns the count.
    pub fn delete_globals(&mut self, prefix: &str) -> usize {
        let before = self.globals.len();
        self.globals.retain(|name, _| !name.starts_with(prefix));
        before - self.globals.len()
    }

    pub fn globals_total(&self) -> usize {
        self.globals.len()
    }

    pub fn global_name(&self, index: usize) -> Option<&str> {
        self.globals.keys().nth(index).map(String::as_str)
    }

    pub fn globals(&self) -> &BTreeMap<String, GlobalVariable> {
        &self.globals
    }

    // ----- timer -----

    /// Fire every `seconds` starting one interval after `now`. A
    /// non-positive interval stops the timer.
    pub fn set_timer(&mut self, seconds: i64, now: i64) -> bool {
        if seconds <= 0 {
            self.timer = None;
            return false;
        }
        self.timer = Some(Timer {
            interval: seconds,
            next_due: now + seconds,
        });
        true
    }

    pub fn kill_timer(&mut self) {
        self.timer = None;
    }

    /// True when the timer is due at `time`; the due time then advances by
    /// one interval, so repeated calls drain every missed tick.
    pub fn should_trigger_timer(&mut self, time: i64) -> bool {
        match &mut self.timer {
            Some(timer) if timer.next_due <= time => {
                timer.next_due += timer.interval;
                true
            }
            _ => false,
        }
    }

    // ----- chart events -----

    pub fn queue_chart_event(&mut self, event: ChartEvent) {
        self.chart_events.push_back(event);
    }

    pub fn take_chart_events(&mut self) -> Vec<ChartEvent> {
        self.chart_events.drain(..).collect()
    }

    // ----- chart objects -----

    /// Add `object` unless its name is taken.
    pub fn create_object(&mut self, object: ChartObject) -> bool {
        if self.object(&object.name).is_some() {
            return false;
        }
        self.objects.push(object);
        true
    }

    pub fn object(&self, name: &str) -> Option<&ChartObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn object_mut(&mut self, name: &str) -> Option<&mut ChartObject> {
        self.objects.iter_mut().find(|o| o.name == name)
    }

    pub fn delete_object(&mut self, name: &str) -> bool {
        let before = self.objects.len();
        self.objects.retain(|o| o.name != name);
        self.objects.len() != before
    }

    /// Delete objects in `window` of `kind` whose name starts with
    /// `prefix`; [`ANY`] matches every window or kind.
    pub fn delete_objects(&mut self, prefix: &str, window: i64, kind: i64) -> usize {
        let before = self.objects.len();
        self.objects
            .retain(|o| !(o.name.starts_with(prefix) && o.matches(window, kind)));
        before - self.objects.len()
    }

    pub fn objects_total(&self, window: i64, kind: i64) -> usize {
        self.objects.iter().filter(|o| o.matches(window, kind)).count()
    }

    /// Name of the `index`-th object among those matching the filters.
    pub fn object_name(&self, index: usize, window: i64, kind: i64) -> Option<&str> {
        self.objects
            .iter()
            .filter(|o| o.matches(window, kind))
            .nth(index)
            .map(|o| o.name.as_str())
    }

    pub fn objects(&self) -> &[ChartObject] {
        &self.objects
    }

    // ----- chart properties -----

    pub fn chart_integer(&self, property: i64) -> Option<i64> {
        self.chart_integers.get(&property).copied()
    }

    pub fn set_chart_integer(&mut self, property: i64, value: i64) {
        self.chart_integers.insert(property, value);
    }

    pub fn chart_double(&self, property: i64) -> Option<f64> {
        self.chart_doubles.get(&property).copied()
    }

    pub fn set_chart_double(&mut self, property: i64, value: f64) {
        self.chart_doubles.insert(property, value);
    }

    pub fn chart_string(&self, property: i64) -> Option<&str> {
        self.chart_strings.get(&property).map(String::as_str)
    }

    pub fn set_chart_string(&mut self, property: i64, value: String) {
        self.chart_strings.insert(property, value);
    }

    // ----- output -----

    pub fn print(&mut self, line: String) {
        self.log.push(line);
    }

    pub fn set_comment(&mut self, text: String) {
        self.comment = text;
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Everything printed so far, one entry per call.
    pub fn log(&self) -> &[String] {
        &self.log
    }
}
