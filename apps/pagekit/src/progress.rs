//! Percentage progress bars, one per unit of work (typically one upload).

use tracing::debug;

use crate::dom::{NodeId, Page};

const PERCENT_ATTR: &str = "aria-valuenow";

/// Handle to one rendered progress bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressTask {
    pub label: String,
    node: NodeId,
    bar: NodeId,
    percent_text: NodeId,
}

impl ProgressTask {
    /// Root element of the task's fragment.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn bar(&self) -> NodeId {
        self.bar
    }
}

#[derive(Clone)]
pub struct ProgressIndicator {
    page: Page,
}

impl ProgressIndicator {
    pub fn new(page: &Page) -> Self {
        Self { page: page.clone() }
    }

    /// Renders a detached fragment showing `label` at 0%.
    pub fn create_task(&self, label: &str) -> ProgressTask {
        let page = &self.page;

        let node = page.create_element("div");
        page.add_class(node, "progress-item");

        let header = page.create_element("div");
        page.add_class(header, "d-flex");
        page.add_class(header, "justify-content-between");
        page.append_child(node, header);

        let name = page.create_element("span");
        page.set_text(name, label);
        page.append_child(header, name);

        let percent_text = page.create_element("span");
        page.add_class(percent_text, "progress-percent");
        page.append_child(header, percent_text);

        let track = page.create_element("div");
        page.add_class(track, "progress");
        page.append_child(node, track);

        let bar = page.create_element("div");
        page.add_class(bar, "progress-bar");
        page.set_attribute(bar, "role", "progressbar");
        page.set_attribute(bar, "aria-valuemin", "0");
        page.set_attribute(bar, "aria-valuemax", "100");
        page.append_child(track, bar);

        let task = ProgressTask {
            label: label.to_string(),
            node,
            bar,
            percent_text,
        };
        self.update_task(&task, 0);
        task
    }

    /// Creates a task and appends it to `region`.
    pub fn create_task_in(&self, region: NodeId, label: &str) -> ProgressTask {
        let task = self.create_task(label);
        self.page.append_child(region, task.node);
        task
    }

    /// Sets the displayed percentage. Values are shown as given; callers
    /// keep them within 0..=100 and non-decreasing.
    pub fn update_task(&self, task: &ProgressTask, percent: u32) {
        let page = &self.page;
        page.set_attribute(task.bar, "style", &format!("width: {percent}%"));
        page.set_attribute(task.bar, PERCENT_ATTR, &percent.to_string());
        page.set_text(task.percent_text, &format!("{percent}%"));
        debug!(label = %task.label, percent, "Progress updated");
    }

    /// Currently displayed percentage, if the task is still rendered.
    pub fn percent(&self, task: &ProgressTask) -> Option<u32> {
        self.page
            .attribute(task.bar, PERCENT_ATTR)
            .and_then(|v| v.parse().ok())
    }

    /// Flags the bar as finished, successfully or not.
    pub fn finish(&self, task: &ProgressTask, ok: bool) {
        let (add, remove) = if ok {
            ("bg-success", "bg-danger")
        } else {
            ("bg-danger", "bg-success")
        };
        self.page.remove_class(task.bar, remove);
        self.page.add_class(task.bar, add);
    }

    /// Removes every task rendered under `region`.
    pub fn clear(&self, region: NodeId) {
        for child in self.page.children(region) {
            self.page.remove(child);
        }
    }
}
