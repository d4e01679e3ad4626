//! Pointer-driven reordering of tasks and sections.
//!
//! Flow: the surface registers geometry, the controller hit-tests every
//! pointer move into the single drag session, and on release the planner
//! turns the drop into mutations that the dispatcher sends to the store.

pub mod controller;
pub mod dispatch;
pub mod geometry;
pub mod planner;
pub mod session;

pub use controller::{CommitOutcome, DndError, DragController};
pub use dispatch::{DispatchError, DispatchReport, Dispatcher};
pub use geometry::{GeometryKey, GeometryRegistry, Point, Rect, RectProvider};
pub use hit_test::{DEFAULT_HIT_SLOP, DragSubject, DropPosition, DropTarget, HitTester, VisibleLayout};
pub use planner::{Plan, PlanError, plan_compaction, plan_drop, plan_full_compaction};
pub use session::{DragSession, DropCommit, SessionError, SessionState};
