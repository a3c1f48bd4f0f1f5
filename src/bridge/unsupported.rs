use super::Bridge;
use crate::capability::OpName;
use crate::error::{BridgeError, Result};
use crate::tensor::{LogicalTensor, TensorSpec};

macro_rules! refused_ops {
    ($($name:ident => $op:ident;)*) => {
        impl Bridge {
            $(
                pub fn $name(&self, _out: &TensorSpec, _operands: &[&LogicalTensor]) -> Result<LogicalTensor> {
                    self.refuse(OpName::$op)
                }
            )*
        }
    };
}

refused_ops! {
    bitcast => Bitcast;
    map => Map;
    population_count => PopulationCount;
    count_leading_zeros => CountLeadingZeros;
    reduce => Reduce;
    window_reduce => WindowReduce;
    eigh => Eigh;
    svd => Svd;
    fft => Fft;
    ifft => Ifft;
    conv => Conv;
    window_sum => WindowSum;
    window_product => WindowProduct;
    window_max => WindowMax;
    window_min => WindowMin;
    window_scatter_max => WindowScatterMax;
    window_scatter_min => WindowScatterMin;
    top_k => TopK;
    erf_inv => ErfInv;
}

impl Bridge {
    fn refuse(&self, op: OpName) -> Result<LogicalTensor> {
        self.gate(op)?;
        Err(BridgeError::InternalMismatch(format!("{op} is registered as implemented but has no translation")))
    }
}
