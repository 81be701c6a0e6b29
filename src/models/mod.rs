pub mod course;
pub mod curriculum;
pub mod instructor;
pub mod media;

pub use course::{CourseDraft, CourseStatus, CourseType, LiveSchedule};
pub use curriculum::{LessonDraft, ResourceDraft, ResourceKind, SectionDraft};
pub use instructor::{InstructorRef, NewInstructor};
pub use media::{MediaRef, PendingFile};
