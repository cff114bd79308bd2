use crate::array::{Array, Sliceable};
use crate::container::HduList;
use crate::descriptor::ExtensionDescriptor;
use crate::dtype::{decode, DType};
use crate::error::Result;
use crate::index::{normalize, IndexExpr};
use crate::plan::{resolve, FetchPlan};

/// Lazy, read-only view of an image HDU's data.
///
/// Each [`Section::get`] fetches exactly the bytes the index selects, with
/// one source read per coalesced byte range, and returns the same array
/// `hdu.data()?.slice(expr)` would. Once the full array has been cached by
/// `data()`, indexing is served from memory instead.
#[derive(Clone, Copy)]
pub struct Section<'a> {
    list: &'a HduList,
    desc: &'a ExtensionDescriptor,
}

impl<'a> Section<'a> {
    pub(crate) fn new(list: &'a HduList, desc: &'a ExtensionDescriptor) -> Self {
        Section { list, desc }
    }

    pub fn shape(&self) -> &'a [usize] {
        &self.desc.shape
    }

    pub fn ndim(&self) -> usize {
        self.desc.shape.len()
    }

    /// Stored element type, before scaling.
    pub fn dtype(&self) -> DType {
        self.desc.dtype
    }

    pub fn descriptor(&self) -> &'a ExtensionDescriptor {
        self.desc
    }

    /// The byte ranges `get(expr)` would read.
    pub fn plan(&self, expr: &IndexExpr) -> Result<FetchPlan> {
        let spec = normalize(&self.desc.shape, expr)?;
        resolve(self.desc, &spec)
    }

    pub fn get(&self, expr: &IndexExpr) -> Result<Array> {
        if let Some(data) = self.list.cached_data(self.desc.index) {
            return data.slice(expr);
        }
        let plan = self.plan(expr)?;
        let bytes = if plan.is_empty() {
            Vec::new()
        } else {
            let fetched = self.list.read_ranges(self.desc.index, &plan.ranges)?;
            plan.assemble(&fetched)?
        };
        tracing::debug!(
            hdu = self.desc.index,
            index = %expr,
            ranges = plan.ranges.len(),
            bytes = bytes.len(),
            "section read"
        );
        let values = self.desc.scaling.apply(decode(&bytes, &self.desc.dtype)?);
        Array::new(plan.shape, values)
    }
}

impl Sliceable for Section<'_> {
    fn shape(&self) -> &[usize] {
        &self.desc.shape
    }

    fn slice(&self, expr: &IndexExpr) -> Result<Array> {
        self.get(expr)
    }
}

impl std::fmt::Debug for Section<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Section")
            .field("hdu", &self.desc.index)
            .field("shape", &self.desc.shape)
            .field("dtype", &self.desc.dtype.name())
            .finish()
    }
}
