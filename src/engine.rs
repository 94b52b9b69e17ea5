//! Event engine (C6), the core. Consumes events, maintains the call
//! stack/method table/edge tables/task registry, attributes time, detects
//! recursion, and handles context switches between cooperatively-scheduled
//! tasks.

use log::{debug, trace};

use crate::bridge::{Event, EventKind, HostBridge};
use crate::measurement::{Measurement, Raw};
use crate::task::TaskRegistry;

/// The event-driven accounting engine. Owns all per-task state; holds no
/// lock because the host is assumed to serialize event delivery onto one
/// OS thread.
pub struct Engine<B: HostBridge> {
    bridge: B,
    measurement: Measurement,
    registry: TaskRegistry<B::TaskHandle>,
    last_task: Option<B::TaskHandle>,
    in_hook: bool,
}

impl<B: HostBridge> Engine<B> {
    pub fn new(bridge: B, measurement: Measurement) -> Self {
        Self { bridge, measurement, registry: TaskRegistry::new(), last_task: None, in_hook: false }
    }

    pub fn registry(&self) -> &TaskRegistry<B::TaskHandle> {
        &self.registry
    }

    /// Consume the engine, handing back its registry, bridge, and the
    /// measurement that timed every frame in it (needed to convert the raw
    /// counters the registry holds into seconds).
    pub fn into_parts(self) -> (TaskRegistry<B::TaskHandle>, B, Measurement) {
        (self.registry, self.bridge, self.measurement)
    }

    /// Handle one execution event. Never returns an error: a malformed or
    /// out-of-order event is recorded or dropped.
    ///
    /// Reentrant calls (the bridge itself triggering an event while we're
    /// still processing one, e.g. during a `to_s` call we make internally)
    /// are dropped; the flag is cleared again as soon as this call returns,
    /// covering every exit path of the inner dispatch below.
    pub fn on_event(&mut self, event: Event<B>) {
        if self.in_hook {
            trace!("dropping event: reentrant call into the engine");
            return;
        }
        self.in_hook = true;
        self.dispatch(event);
        self.in_hook = false;
    }

    fn dispatch(&mut self, event: Event<B>) {
        if event.self_ref == self.bridge.profiler_sentinel() {
            trace!("dropping event: self-event from the profiler module");
            return;
        }

        let class_handle = if self.bridge.is_included_module_proxy(event.class_handle) {
            self.bridge.resolve_real_class(event.class_handle)
        } else {
            event.class_handle
        };

        let now = self.measurement.now();
        self.accumulate_wait_on_switch(&event.task_handle, now);

        match event.kind {
            EventKind::Line => self.handle_line(
                &event.task_handle,
                class_handle,
                event.method_id,
                event.source_file,
                event.source_line,
                now,
            ),
            EventKind::Call => {
                self.handle_call(&event.task_handle, class_handle, event.method_id, event.source_file, event.source_line, now, false);
            }
            EventKind::CCall => {
                self.handle_call(&event.task_handle, class_handle, event.method_id, None, 0, now, true);
            }
            EventKind::Return | EventKind::CReturn => self.handle_return(&event.task_handle, now),
        }
    }

    /// Context-switch accounting: charge wait time to the frame that was
    /// on top when its task was suspended.
    fn accumulate_wait_on_switch(&mut self, task_handle: &B::TaskHandle, now: Raw) {
        let switched = self.last_task.as_ref() != Some(task_handle);
        if !switched {
            return;
        }

        let wait = {
            let task = self.registry.get_or_create(task_handle);
            if task.last_switch_time == 0 {
                0
            } else {
                now.saturating_sub(task.last_switch_time)
            }
        };

        {
            let task = self.registry.get_or_create(task_handle);
            if let Some(frame) = task.stack.peek_mut() {
                frame.wait_time += wait;
            }
        }

        if let Some(last_handle) = self.last_task.clone() {
            let last_task = self.registry.get_or_create(&last_handle);
            last_task.last_switch_time = now;
        }

        {
            let task = self.registry.get_or_create(task_handle);
            task.last_switch_time = 0;
        }

        self.last_task = Some(task_handle.clone());
    }

    /// LINE event handler: update the top frame's call-site line, or fall
    /// through to CALL handling on first observation.
    fn handle_line(
        &mut self,
        task_handle: &B::TaskHandle,
        class_handle: u64,
        method_id: u64,
        source_file: Option<String>,
        source_line: u32,
        now: Raw,
    ) {
        let has_top = {
            let task = self.registry.get_or_create(task_handle);
            if let Some(frame) = task.stack.peek_mut() {
                frame.line = source_line;
                true
            } else {
                false
            }
        };
        if !has_top {
            self.handle_call(task_handle, class_handle, method_id, source_file, source_line, now, false);
        }
    }

    /// `CALL`/`C_CALL` handler.
    #[allow(clippy::too_many_arguments)]
    fn handle_call(
        &mut self,
        task_handle: &B::TaskHandle,
        class_handle: u64,
        method_id: u64,
        source_file: Option<String>,
        source_line: u32,
        now: Raw,
        is_c_call: bool,
    ) {
        let task = self.registry.get_or_create(task_handle);
        let (sf, ln) = if is_c_call { (None, 0) } else { (source_file, source_line) };
        let base = task.methods.get_or_create_base(class_handle, method_id, sf, ln);

        let depth = task.methods.get(base).active_frames;
        task.methods.get_mut(base).active_frames += 1;

        let chosen = if depth > 0 { task.methods.get_or_create_recursive(base, depth) } else { base };

        task.stack.push(chosen, now, source_line);
    }

    /// `RETURN`/`C_RETURN` handler.
    fn handle_return(&mut self, task_handle: &B::TaskHandle, now: Raw) {
        let task = self.registry.get_or_create(task_handle);
        let Some(frame) = task.stack.pop() else {
            debug!("dropping RETURN with no matching CALL (host stack unwind)");
            return;
        };

        let total = now.saturating_sub(frame.start_time);
        let self_time = total.saturating_sub(frame.child_time).saturating_sub(frame.wait_time);

        {
            let method = task.methods.get_mut(frame.method);
            method.called += 1;
            method.total_time += total;
            method.self_time += self_time;
            method.wait_time += frame.wait_time;
        }

        let base = task.methods.get(frame.method).base;
        task.methods.get_mut(base).active_frames -= 1;

        let Some(parent_index) = task.stack.peek().map(|f| f.method) else {
            return;
        };
        let parent_line = task.stack.peek().expect("just checked").line;
        if let Some(parent_frame) = task.stack.peek_mut() {
            parent_frame.child_time += total;
        }

        let frame_key = task.methods.get(frame.method).key;
        let parent_key = task.methods.get(parent_index).key;

        task.methods.get_mut(parent_index).children.upsert(
            frame_key,
            frame.method,
            total,
            self_time,
            frame.wait_time,
            parent_line,
        );
        task.methods.get_mut(frame.method).parents.upsert(
            parent_key,
            parent_index,
            total,
            self_time,
            frame.wait_time,
            parent_line,
        );
    }
}
