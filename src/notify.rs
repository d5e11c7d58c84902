use crate::{geometry::Rect, visibility::VisibilityMode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DockNotification {
    MaskAreaChanged(Rect),
    WindowInAttentionChanged(bool),
    IsHoveredChanged(bool),
    PanelVisibilityChanged(VisibilityMode),
    MustBeRaised,
    MustBeLowered,
    LocationChanged,
    MaximumLengthChanged(u32),
    DisableHidingChanged(bool),
    IsAutoHiddenChanged(bool),
    ImmutableChanged(bool),
    ChildrenLengthChanged(i32),
    ScreenGeometryChanged(Rect),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Box<dyn FnMut(&DockNotification)>;

#[derive(Default)]
pub struct Observers {
    next_id: u64,
    observers: Vec<(ObserverId, Observer)>,
}

impl Observers {
    pub fn subscribe(&mut self, observer: impl FnMut(&DockNotification) + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    pub fn emit(&mut self, notification: DockNotification) {
        tracing::trace!(?notification, "dock notification");
        for (_, observer) in &mut self.observers {
            observer(&notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[test]
    fn unsubscribed_observers_stop_receiving() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut observers = Observers::default();

        let sink = seen.clone();
        let id = observers.subscribe(move |n| sink.borrow_mut().push(*n));
        observers.emit(DockNotification::MustBeRaised);

        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.emit(DockNotification::MustBeLowered);

        assert_eq!(*seen.borrow(), vec![DockNotification::MustBeRaised]);
    }
}
