use anyhow::Result;

/// A unit of work applied to every input item of an execution.
///
/// Implementations are invoked concurrently from the calling thread and from
/// pool threads, each time on a distinct input.
pub trait ExecuteUnit<I, O>: Send + Sync {
    fn execute(&self, input: I) -> Result<O>;
}

impl<I, O, F> ExecuteUnit<I, O> for F
where
    F: Fn(I) -> Result<O> + Send + Sync,
{
    fn execute(&self, input: I) -> Result<O> {
        self(input)
    }
}

/// Folds the ordered outputs of one execution into a single value.
///
/// Called once per merge execution, on the calling thread, after every
/// output has been collected.
pub trait MergeUnit<M, O> {
    fn merge(&self, results: Vec<M>) -> Result<O>;
}

impl<M, O, F> MergeUnit<M, O> for F
where
    F: Fn(Vec<M>) -> Result<O>,
{
    fn merge(&self, results: Vec<M>) -> Result<O> {
        self(results)
    }
}
