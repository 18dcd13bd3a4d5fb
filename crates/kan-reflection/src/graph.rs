//! A minimal checkpoint-ordered mutator scheduler standing in for the
//! real workflow graph (spec.md §5): "mutators wired into a workflow
//! graph with explicit dependency edges on named checkpoints... Order
//! is enforced by the graph; no mutator runs concurrently with another
//! that reads or writes overlapping state."
//!
//! For the in-process engines this reduces to running registered
//! mutators strictly in checkpoint order, once per frame.

use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Checkpoint {
    MaterialBegin,
    MaterialEnd,
    MaterialInstanceBegin,
    MaterialInstanceEnd,
    ResourceProviderBegin,
    ResourceProviderEnd,
    FrameBegin,
    FrameEnd,
    CustomSyncBegin,
    CustomSyncEnd,
}

/// One unit of work bound to a checkpoint, e.g. "material management
/// planning", "material instance execution", "custom-sync mutator".
pub trait Mutator: Debug {
    fn checkpoint(&self) -> Checkpoint;
    fn run(&mut self);
}

/// Runs mutators strictly in ascending checkpoint order, and within a
/// checkpoint in registration order — the ordering guarantee spec.md
/// §5 describes.
#[derive(Debug, Default)]
pub struct MutatorGraph {
    mutators: Vec<Box<dyn Mutator>>,
}

impl MutatorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, mutator: Box<dyn Mutator>) {
        self.mutators.push(mutator);
    }

    pub fn run_frame(&mut self) {
        self.mutators.sort_by_key(|m| m.checkpoint());
        for mutator in &mut self.mutators {
            mutator.run();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct Recorder {
        checkpoint: Checkpoint,
        log: Rc<RefCell<Vec<Checkpoint>>>,
    }

    impl Mutator for Recorder {
        fn checkpoint(&self) -> Checkpoint {
            self.checkpoint
        }
        fn run(&mut self) {
            self.log.borrow_mut().push(self.checkpoint);
        }
    }

    #[test]
    fn runs_in_checkpoint_order_regardless_of_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut graph = MutatorGraph::new();
        graph.register(Box::new(Recorder {
            checkpoint: Checkpoint::FrameEnd,
            log: log.clone(),
        }));
        graph.register(Box::new(Recorder {
            checkpoint: Checkpoint::MaterialBegin,
            log: log.clone(),
        }));
        graph.register(Box::new(Recorder {
            checkpoint: Checkpoint::MaterialInstanceBegin,
            log: log.clone(),
        }));
        graph.run_frame();
        assert_eq!(
            *log.borrow(),
            vec![
                Checkpoint::MaterialBegin,
                Checkpoint::MaterialInstanceBegin,
                Checkpoint::FrameEnd
            ]
        );
    }
}
